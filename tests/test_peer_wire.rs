use bitlite::millisec;
use bitlite::pwp::{self, Message, MessageId, UnchokePolicy};
use bitlite::utils::discovery::{PeerLocator, StaticLocator};
use bitlite::utils::peer_id::PeerId;
use std::io::Read;
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::thread;

const INFO_HASH: [u8; 20] = [0xab; 20];

fn listen() -> (TcpListener, StaticLocator) {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let locator = StaticLocator::from(listener.local_addr().unwrap());
    (listener, locator)
}

fn connect(locator: &impl PeerLocator) -> TcpStream {
    let (ip, port) = locator.locate("wlo1").unwrap();
    pwp::connect_to_peer(&ip, port).unwrap()
}

/// Remote side of a well-behaved session: handshake, bitfield, wait for interested, unchoke.
fn serve_seeder(listener: TcpListener, remote_id: [u8; 20]) -> thread::JoinHandle<pwp::Handshake> {
    thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let local = pwp::read_handshake(&mut sock).unwrap();
        pwp::send_handshake(&mut sock, &local.info_hash, &remote_id).unwrap();

        let bitfield = pwp::bitfield_from_payload(&[0b1110_0000], 3);
        Message::bitfield(&bitfield).write_to(&mut sock).unwrap();

        let interested = pwp::read_message(&mut sock).unwrap();
        assert_eq!(MessageId::Interested, interested.id());
        assert_eq!(1, interested.length());

        Message::keep_alive().write_to(&mut sock).unwrap();
        Message::unchoke().write_to(&mut sock).unwrap();
        local
    })
}

#[test]
fn test_full_session_until_unchoke() {
    let (listener, locator) = listen();
    let remote_id = *b"-XX0100-remotepeer01";
    let seeder = serve_seeder(listener, remote_id);

    let local_id = PeerId::generate_new();
    let mut stream = connect(&locator);
    pwp::send_handshake(&mut stream, &INFO_HASH, &local_id).unwrap();

    let remote = pwp::read_handshake(&mut stream).unwrap();
    assert_eq!(INFO_HASH, remote.info_hash);
    assert_eq!(remote_id, remote.peer_id);
    assert_eq!([0u8; 8], remote.reserved);

    assert!(pwp::send_interested(&mut stream));
    let backlog = pwp::wait_for_unchoke_with_backlog(&mut stream, &UnchokePolicy::default()).unwrap();
    assert_eq!(1, backlog.len());
    assert_eq!(MessageId::Bitfield, backlog[0].id());
    let bitfield = pwp::bitfield_from_payload(backlog[0].payload(), 3);
    assert_eq!(3, bitfield.count_ones());

    let local = seeder.join().unwrap();
    assert_eq!(pwp::Handshake::new(&INFO_HASH, &local_id), local);
}

#[test]
fn test_bitfield_right_after_handshake() {
    let (listener, locator) = listen();
    let seeder = serve_seeder(listener, [b'r'; 20]);

    let mut stream = connect(&locator);
    pwp::send_handshake(&mut stream, &INFO_HASH, &[b'l'; 20]).unwrap();
    assert!(pwp::receive_handshake(&mut stream));

    let bitfield = pwp::receive_bitfield(&mut stream, 2);
    assert_eq!(2, bitfield.len());
    assert!(bitfield.all());

    assert!(pwp::send_interested(&mut stream));
    assert!(pwp::wait_for_unchoke(&mut stream, &UnchokePolicy::default()));
    seeder.join().unwrap();
}

#[test]
fn test_choking_peer_times_out() {
    let (listener, locator) = listen();
    let remote = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let local = pwp::read_handshake(&mut sock).unwrap();
        pwp::send_handshake(&mut sock, &local.info_hash, &[b'c'; 20]).unwrap();
        Message::new(MessageId::Choke, Vec::new()).write_to(&mut sock).unwrap();
        // hold the connection open until the client gives up
        let mut rest = Vec::new();
        let _ = sock.read_to_end(&mut rest);
    });

    let mut stream = connect(&locator);
    pwp::send_handshake(&mut stream, &INFO_HASH, &[b'l'; 20]).unwrap();
    assert!(pwp::receive_handshake(&mut stream));

    let policy = UnchokePolicy {
        attempts: 2,
        timeout: millisec!(100),
        max_messages: 16,
    };
    assert!(!pwp::wait_for_unchoke(&mut stream, &policy));
    drop(stream);
    remote.join().unwrap();
}

#[test]
fn test_handshake_from_non_bittorrent_peer_is_rejected() {
    let (listener, locator) = listen();
    let remote = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        assert!(pwp::receive_handshake(&mut sock));
        std::io::Write::write_all(&mut sock, &[b'x'; 68]).unwrap();
    });

    let mut stream = connect(&locator);
    pwp::send_handshake(&mut stream, &INFO_HASH, &[b'l'; 20]).unwrap();
    assert!(!pwp::receive_handshake(&mut stream));
    remote.join().unwrap();
}

#[test]
fn test_peer_hanging_up_mid_message_closes_connection() {
    let (listener, locator) = listen();
    let remote = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        std::io::Write::write_all(&mut sock, &[0, 0, 0, 10, 7, 1, 2]).unwrap();
    });

    let mut stream = connect(&locator);
    remote.join().unwrap();
    assert!(matches!(pwp::read_message(&mut stream), Err(pwp::Error::ConnectionClosed(_))));
}
