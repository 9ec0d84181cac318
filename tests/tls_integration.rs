//! TLS integration tests
//!
//! These tests run real handshakes over loopback sockets:
//! - structured options on both client and server
//! - certificate verification with CA files and inline CA data
//! - hostname verification failures
//! - password-protected keys
//! - legacy keyword mappings and the absent configuration
//! - deferred handshakes
//! - ragged EOF handling

mod common;

use common::{generate_pki, socket_pair, TestPki, KEY_PASSWORD};
use std::net::{Shutdown, TcpStream};
use std::thread;
use wireprep::tls::{
    wrap_socket, OpensslBackend, TlsConfig, TlsError, TlsOptions, TlsTransport, TlsValue,
    VerifyMode,
};
use wireprep::transport::{Error, TransportOps};

fn server_options(pki: &TestPki) -> TlsOptions {
    TlsOptions::new()
        .cert_file(&pki.cert_file)
        .key_file(&pki.key_file)
        .verify_mode(VerifyMode::None)
        .server_side(true)
}

/// Accept TLS on `sock` and echo one 5-byte message back
fn spawn_echo_server(
    sock: TcpStream,
    config: TlsConfig,
) -> thread::JoinHandle<Result<(), TlsError>> {
    thread::spawn(move || {
        let mut transport = wrap_socket(&OpensslBackend, sock, &config)?;

        let mut buf = [0u8; 5];
        let mut read = 0;
        while read < buf.len() {
            let n = transport.read(&mut buf[read..]).unwrap();
            assert!(n > 0, "client closed early");
            read += n;
        }
        transport.write_all(&buf).unwrap();
        let _ = transport.close();
        Ok(())
    })
}

fn exchange(transport: &mut TlsTransport) {
    transport.write_all(b"Hello").unwrap();

    let mut buf = [0u8; 5];
    let mut read = 0;
    while read < buf.len() {
        let n = transport.read(&mut buf[read..]).unwrap();
        assert!(n > 0, "server closed early");
        read += n;
    }
    assert_eq!(&buf, b"Hello");
}

#[test]
fn test_structured_client_and_server() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let client_config: TlsConfig = TlsOptions::new().verify_mode(VerifyMode::None).into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    assert!(client.is_handshake_complete());
    assert!(client.version().contains("TLS"));
    assert!(client.cipher().is_some());

    exchange(&mut client);

    server.join().unwrap().unwrap();
}

#[test]
fn test_verify_with_ca_file_and_hostname() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let client_config: TlsConfig = TlsOptions::new()
        .ca_file(&pki.cert_file)
        .server_hostname("localhost")
        .into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_verify_with_inline_ca_data() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let client_config: TlsConfig = TlsOptions::new()
        .ca_data(pki.cert_pem.clone())
        .server_hostname("localhost")
        .into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_hostname_mismatch_fails_handshake() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let client_config: TlsConfig = TlsOptions::new()
        .ca_file(&pki.cert_file)
        .server_hostname("broker.example.com")
        .into();
    let result = wrap_socket(&OpensslBackend, client_sock, &client_config);

    assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));
    assert!(server.join().unwrap().is_err());
}

#[test]
fn test_untrusted_server_fails_handshake() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    // Default verification without our CA loaded
    let client_config: TlsConfig = TlsOptions::new().server_hostname("localhost").into();
    let result = wrap_socket(&OpensslBackend, client_sock, &client_config);

    assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));
    assert!(server.join().unwrap().is_err());
}

#[test]
fn test_password_protected_key() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server_config: TlsConfig = server_options(&pki)
        .key_file(&pki.encrypted_key_file)
        .key_password(KEY_PASSWORD)
        .into();
    let server = spawn_echo_server(server_sock, server_config);

    let client_config: TlsConfig = TlsOptions::new().verify_mode(VerifyMode::None).into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_wrong_key_password() {
    let pki = generate_pki();
    let (_client_sock, server_sock) = socket_pair();

    let server_config: TlsConfig = server_options(&pki)
        .key_file(&pki.encrypted_key_file)
        .key_password("wrong")
        .into();
    let result = wrap_socket(&OpensslBackend, server_sock, &server_config);

    assert!(matches!(result, Err(TlsError::Certificate(_))));
}

#[test]
fn test_missing_certificate_file() {
    let (_client_sock, server_sock) = socket_pair();

    let server_config: TlsConfig = TlsOptions::new()
        .cert_file("/nonexistent/cert.pem")
        .server_side(true)
        .into();
    let result = wrap_socket(&OpensslBackend, server_sock, &server_config);

    assert!(matches!(result, Err(TlsError::OpenSsl(_))));
}

#[test]
fn test_key_inside_certificate_file() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server_config: TlsConfig = TlsOptions::new()
        .cert_file(&pki.bundle_file)
        .verify_mode(VerifyMode::None)
        .server_side(true)
        .into();
    let server = spawn_echo_server(server_sock, server_config);

    let client_config: TlsConfig = TlsOptions::new().verify_mode(VerifyMode::None).into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_hostname_rejected_on_server_side() {
    let pki = generate_pki();
    let (_client_sock, server_sock) = socket_pair();

    let server_config: TlsConfig = server_options(&pki).server_hostname("localhost").into();
    let result = wrap_socket(&OpensslBackend, server_sock, &server_config);

    assert!(matches!(result, Err(TlsError::InvalidConfig(_))));
}

#[test]
fn test_legacy_server_with_absent_client() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server_config = TlsConfig::legacy([
        ("server_side", TlsValue::from(true)),
        ("certfile", pki.cert_file.to_str().unwrap().into()),
        ("keyfile", pki.key_file.to_str().unwrap().into()),
        ("ciphers", "HIGH:!aNULL".into()),
    ]);
    let server = spawn_echo_server(server_sock, server_config);

    // Absent: plain wrap, no peer verification
    let mut client = wrap_socket(&OpensslBackend, client_sock, &TlsConfig::Absent).unwrap();

    assert!(client.is_handshake_complete());
    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_legacy_unknown_argument() {
    let (client_sock, _server_sock) = socket_pair();

    let config = TlsConfig::legacy([("ssl", "options")]);
    let result = wrap_socket(&OpensslBackend, client_sock, &config);

    assert!(matches!(result, Err(TlsError::UnknownArgument(k)) if k == "ssl"));
}

#[test]
fn test_legacy_keyfile_without_certfile() {
    let (client_sock, _server_sock) = socket_pair();

    let config = TlsConfig::legacy([
        ("keyfile", TlsValue::from("/nonexistent/key.pem")),
        ("do_handshake_on_connect", false.into()),
    ]);
    let result = wrap_socket(&OpensslBackend, client_sock, &config);

    assert!(matches!(result, Err(TlsError::InvalidConfig(_))));
}

#[test]
fn test_legacy_verification_with_ca_certs() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let config = TlsConfig::legacy([
        ("ca_certs", TlsValue::from(pki.cert_file.to_str().unwrap())),
        ("cert_reqs", TlsValue::Int(2)),
    ]);
    let mut client = wrap_socket(&OpensslBackend, client_sock, &config).unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_legacy_verification_without_ca_certs() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    // Legacy wraps never load the system trust store
    let config = TlsConfig::legacy([("cert_reqs", TlsValue::from("CERT_REQUIRED"))]);
    let result = wrap_socket(&OpensslBackend, client_sock, &config);

    assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));
    assert!(server.join().unwrap().is_err());
}

#[test]
fn test_legacy_ssl_version_pins_protocol() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    // Server accepts TLS 1.2 and 1.3
    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let config = TlsConfig::legacy([("ssl_version", "PROTOCOL_TLSv1_2")]);
    let mut client = wrap_socket(&OpensslBackend, client_sock, &config).unwrap();

    assert_eq!(client.version(), "TLSv1.2");
    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_deferred_handshake() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let client_config: TlsConfig = TlsOptions::new()
        .verify_mode(VerifyMode::None)
        .do_handshake_on_connect(false)
        .into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();

    assert!(!client.is_handshake_complete());
    client.do_handshake().unwrap();
    assert!(client.is_handshake_complete());

    // Second call is a no-op
    client.do_handshake().unwrap();

    exchange(&mut client);
    server.join().unwrap().unwrap();
}

#[test]
fn test_legacy_deferred_handshake() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_echo_server(server_sock, server_options(&pki).into());

    let config = TlsConfig::legacy([("do_handshake_on_connect", false)]);
    let mut client = wrap_socket(&OpensslBackend, client_sock, &config).unwrap();
    assert!(!client.is_handshake_complete());

    // First I/O drives the handshake
    exchange(&mut client);
    assert!(client.is_handshake_complete());
    server.join().unwrap().unwrap();
}

/// Server completes the handshake, then drops TCP without close_notify
fn spawn_ragged_server(pki: &TestPki, sock: TcpStream) -> thread::JoinHandle<()> {
    let config: TlsConfig = server_options(pki).into();
    thread::spawn(move || {
        let mut transport = wrap_socket(&OpensslBackend, sock, &config).unwrap();
        transport.get_mut().shutdown(Shutdown::Both).unwrap();
    })
}

#[test]
fn test_ragged_eof_suppressed() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_ragged_server(&pki, server_sock);

    let client_config: TlsConfig = TlsOptions::new().verify_mode(VerifyMode::None).into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();
    server.join().unwrap();

    assert!(client.suppresses_ragged_eofs());
    let mut buf = [0u8; 16];
    assert_eq!(client.read(&mut buf).unwrap(), 0);
    assert!(!client.failed());
}

#[test]
fn test_ragged_eof_reported() {
    let pki = generate_pki();
    let (client_sock, server_sock) = socket_pair();

    let server = spawn_ragged_server(&pki, server_sock);

    let client_config: TlsConfig = TlsOptions::new()
        .verify_mode(VerifyMode::None)
        .suppress_ragged_eofs(false)
        .into();
    let mut client = wrap_socket(&OpensslBackend, client_sock, &client_config).unwrap();
    server.join().unwrap();

    assert!(!client.suppresses_ragged_eofs());
    let mut buf = [0u8; 16];
    match client.read(&mut buf) {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("expected unexpected EOF, got {:?}", other),
    }
    assert!(client.failed());
}
