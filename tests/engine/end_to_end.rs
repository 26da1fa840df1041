//! Full-connection scenarios: a server engine on one thread, a raw
//! HTTP/2 peer driven by the test on the other.

use std::thread;

use h2_engine::transport::mem;
use h2_engine::{
    flags, Connection, Error, Frame, FrameType, Header, NoServerRequests, Params, StartLine,
    TransportWrite,
};

use crate::support::{events_of, get_request, recording, Event, RawPeer, TestServer};

fn spawn_server(
    params: Params,
) -> (
    RawPeer,
    std::sync::Arc<std::sync::Mutex<crate::support::RecordingDelegate>>,
    std::sync::Arc<std::sync::Mutex<Vec<h2_engine::Stream>>>,
    thread::JoinHandle<Result<(), Error>>,
) {
    let (client_end, server_end) = mem::pair();
    let (concrete, shared) = recording();
    let mut server = TestServer::new(shared);
    let streams = server.streams.clone();
    let mut conn = Connection::new(server_end, false, params).unwrap();
    let handle = thread::spawn(move || conn.run(&mut server));

    let mut peer = RawPeer::new(client_end);
    peer.send_preface();
    (peer, concrete, streams, handle)
}

#[test]
fn test_get_request_with_no_body() {
    let (mut peer, delegate, streams, handle) = spawn_server(Params::default());

    peer.send_headers(
        1,
        flags::END_HEADERS | flags::END_STREAM,
        &get_request(),
    );
    peer.close();
    assert!(handle.join().unwrap().is_ok());

    // headers_received then finish, with a request start line; no DATA
    // frame was ever dispatched.
    let events = events_of(&delegate);
    assert_eq!(events.len(), 2);
    match &events[0] {
        Event::Headers { start_line, headers } => {
            assert_eq!(*start_line, StartLine::request("GET", "/"));
            assert_eq!(start_line.version(), "HTTP/2.0");
            assert!(headers.is_empty());
        }
        other => panic!("expected Headers, got {:?}", other),
    }
    assert_eq!(events[1], Event::Finish);

    // The stream's completion signal resolved.
    let streams = streams.lock().unwrap();
    assert_eq!(streams.len(), 1);
    assert!(streams[0].completion().is_set());
}

#[test]
fn test_post_request_with_body() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    peer.send_headers(
        1,
        flags::END_HEADERS,
        &[
            Header::new(":method", "POST"),
            Header::new(":path", "/submit"),
            Header::new("content-type", "text/plain"),
        ],
    );
    peer.send_frame(&Frame::new(FrameType::Data, 0, 1, b"hel".to_vec()));
    peer.send_frame(&Frame::new(
        FrameType::Data,
        flags::END_STREAM,
        1,
        b"lo".to_vec(),
    ));
    peer.close();
    assert!(handle.join().unwrap().is_ok());

    let events = events_of(&delegate);
    assert_eq!(
        events,
        vec![
            Event::Headers {
                start_line: StartLine::request("POST", "/submit"),
                headers: vec![Header::new("content-type", "text/plain")],
            },
            Event::Data(b"hel".to_vec()),
            Event::Data(b"lo".to_vec()),
            Event::Finish,
        ]
    );
}

#[test]
fn test_server_responds_on_inbound_stream() {
    let (mut peer, _delegate, streams, handle) = spawn_server(Params::default());

    peer.send_headers(1, flags::END_HEADERS | flags::END_STREAM, &get_request());

    // Wait for the request to reach the delegate, then respond on the
    // stream handle the connection handed out.
    let stream = loop {
        if let Some(s) = streams.lock().unwrap().first().cloned() {
            break s;
        }
        thread::yield_now();
    };
    stream.completion().wait();

    stream
        .write_headers(
            &StartLine::response(200),
            &[Header::new("content-length", "2")],
            Some(b"ok"),
        )
        .unwrap();
    stream.finish().unwrap();

    // First frame on the wire is the server's handshake SETTINGS.
    assert_eq!(peer.read_frame().frame_type, FrameType::Settings);
    let headers_frame = peer.read_frame();
    assert_eq!(headers_frame.frame_type, FrameType::Headers);
    assert_eq!(headers_frame.stream_id, 1);
    let data_frame = peer.read_frame();
    assert_eq!(data_frame.payload, b"ok");
    assert_eq!(peer.read_frame().flags, flags::END_STREAM);

    peer.close();
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn test_head_request_forces_empty_response_body() {
    let (mut peer, _delegate, streams, handle) = spawn_server(Params::default());

    peer.send_headers(
        1,
        flags::END_HEADERS | flags::END_STREAM,
        &[
            Header::new(":method", "HEAD"),
            Header::new(":path", "/"),
        ],
    );

    let stream = loop {
        if let Some(s) = streams.lock().unwrap().first().cloned() {
            break s;
        }
        thread::yield_now();
    };
    stream.completion().wait();

    // Content-Length advertised, but a HEAD response must send no bytes.
    stream
        .write_headers(
            &StartLine::response(200),
            &[Header::new("content-length", "42")],
            None,
        )
        .unwrap();
    let err = stream.write(b"body").unwrap_err();
    assert!(matches!(err, Error::ContentLengthOverrun));

    // The rejected write never reached the wire; the stream was reset.
    assert_eq!(peer.read_frame().frame_type, FrameType::Settings);
    assert_eq!(peer.read_frame().frame_type, FrameType::Headers);
    assert_eq!(peer.read_frame().frame_type, FrameType::RstStream);

    peer.close();
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn test_rst_stream_before_end_stream_notifies_close() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    peer.send_headers(1, flags::END_HEADERS, &get_request());
    peer.send_rst_stream(1);
    peer.close();
    assert!(handle.join().unwrap().is_ok());

    let events = events_of(&delegate);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Headers { .. }));
    assert_eq!(events[1], Event::ConnectionClose);
}

#[test]
fn test_rst_stream_after_end_stream_is_noop() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    peer.send_headers(1, flags::END_HEADERS | flags::END_STREAM, &get_request());
    peer.send_rst_stream(1);
    peer.close();
    assert!(handle.join().unwrap().is_ok());

    // No ConnectionClose: the stream already finished cleanly.
    let events = events_of(&delegate);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Headers { .. }));
    assert_eq!(events[1], Event::Finish);
}

#[test]
fn test_completed_stream_id_cannot_be_reused() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    // Stream 1 completes and is dropped from the table, but its id stays
    // spent: a second HEADERS for id 1 is a duplicate, not a new stream.
    peer.send_headers(1, flags::END_HEADERS | flags::END_STREAM, &get_request());
    peer.send_headers(1, flags::END_HEADERS | flags::END_STREAM, &get_request());

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(Error::DuplicateStream(1))));

    // Only the first request reached the delegate.
    let events = events_of(&delegate);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], Event::Headers { .. }));
    assert_eq!(events[1], Event::Finish);
}

#[test]
fn test_inbound_stream_ids_must_increase() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    peer.send_headers(5, flags::END_HEADERS | flags::END_STREAM, &get_request());
    peer.send_headers(3, flags::END_HEADERS | flags::END_STREAM, &get_request());

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(Error::DuplicateStream(3))));
    assert_eq!(events_of(&delegate).len(), 2);
}

#[test]
fn test_headers_priority_prefix_is_skipped() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params::default());

    // Five bytes of stream dependency + weight ahead of the header block;
    // the values are discarded, the request parses as usual.
    let block = peer.encoder.encode(&get_request());
    let mut payload = vec![0, 0, 0, 0, 16];
    payload.extend_from_slice(&block);
    peer.send_frame(&Frame::new(
        FrameType::Headers,
        flags::PRIORITY | flags::END_HEADERS | flags::END_STREAM,
        1,
        payload,
    ));
    peer.close();
    assert!(handle.join().unwrap().is_ok());

    let events = events_of(&delegate);
    assert_eq!(events.len(), 2);
    match &events[0] {
        Event::Headers { start_line, headers } => {
            assert_eq!(*start_line, StartLine::request("GET", "/"));
            assert!(headers.is_empty());
        }
        other => panic!("expected Headers, got {:?}", other),
    }
    assert_eq!(events[1], Event::Finish);
}

#[test]
fn test_headers_priority_flag_with_short_payload_is_fatal() {
    let (mut peer, _delegate, _streams, handle) = spawn_server(Params::default());

    // PRIORITY promises a 5-byte prefix that is not there.
    peer.send_frame(&Frame::new(
        FrameType::Headers,
        flags::PRIORITY | flags::END_HEADERS | flags::END_STREAM,
        1,
        vec![0, 0, 0],
    ));

    let result = handle.join().unwrap();
    assert!(matches!(
        result,
        Err(Error::InvalidStreamFrame(FrameType::Headers, 1))
    ));
}

#[test]
fn test_client_receives_response_headers() {
    let (client_end, server_end) = mem::pair();
    let mut conn = Connection::new(client_end, true, Params::default()).unwrap();
    let (concrete, shared) = recording();
    let stream = conn.create_stream(shared.clone());
    let completion = stream.read_response(&shared).unwrap();

    let handle = thread::spawn(move || conn.run(&mut NoServerRequests));

    // The raw peer plays the server: swallow the handshake, then respond.
    let mut peer = RawPeer::new(server_end);
    assert_eq!(peer.read_preface(), h2_engine::CLIENT_PREFACE);
    assert_eq!(peer.read_frame().frame_type, FrameType::Settings);

    peer.send_headers(
        1,
        flags::END_HEADERS | flags::END_STREAM,
        &[
            Header::new(":status", "404"),
            Header::new("content-type", "text/html"),
        ],
    );
    completion.wait();

    let events = events_of(&concrete);
    assert_eq!(events.len(), 2);
    match &events[0] {
        Event::Headers { start_line, headers } => {
            assert_eq!(
                *start_line,
                StartLine::Response {
                    status: 404,
                    reason: "Not Found".to_string(),
                }
            );
            assert_eq!(headers, &vec![Header::new("content-type", "text/html")]);
        }
        other => panic!("expected Headers, got {:?}", other),
    }
    assert_eq!(events[1], Event::Finish);

    peer.close();
    assert!(handle.join().unwrap().is_ok());
}

#[test]
fn test_oversized_header_block_fails_stream_not_connection() {
    let (mut peer, delegate, _streams, handle) = spawn_server(Params {
        max_header_size: 32,
    });

    let mut padded = get_request();
    padded.push(Header::new(
        "x-large",
        "a-value-long-enough-to-push-the-block-past-thirty-two-bytes",
    ));
    peer.send_headers(1, flags::END_HEADERS | flags::END_STREAM, &padded);

    // The stream is reset; the connection survives. (The handshake
    // SETTINGS frame precedes the RST_STREAM on the wire.)
    assert_eq!(peer.read_frame().frame_type, FrameType::Settings);
    let rst = peer.read_frame();
    assert_eq!(rst.frame_type, FrameType::RstStream);
    assert_eq!(rst.stream_id, 1);

    peer.close();
    assert!(handle.join().unwrap().is_ok());
    assert_eq!(events_of(&delegate), vec![Event::ConnectionClose]);
}

#[test]
fn test_mid_frame_close_ends_loop_quietly() {
    let (mut peer, _delegate, _streams, handle) = spawn_server(Params::default());

    // Frame header promising a payload that never arrives.
    peer.writer.write_all(&[0, 0, 99, 0, 0, 0, 0, 0, 1]).unwrap();
    peer.close();

    assert!(handle.join().unwrap().is_ok());
}
