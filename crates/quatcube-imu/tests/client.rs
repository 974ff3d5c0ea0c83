use quatcube_config::Protocol;
use quatcube_imu::protocol::encode_frame;
use quatcube_imu::{ImuClient, Orientation, OrientationStore};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn wait_until_stopped(client: &ImuClient) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while client.is_running() {
        assert!(Instant::now() < deadline, "reader did not stop");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Hands out at most `chunk` bytes per read.
struct Trickle {
    data: Cursor<Vec<u8>>,
    chunk: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.chunk);
        self.data.read(&mut buf[..n])
    }
}

/// Never produces data; every read times out.
struct Silent {
    reads: Arc<AtomicUsize>,
}

impl Read for Silent {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        std::thread::sleep(Duration::from_millis(2));
        Err(io::ErrorKind::TimedOut.into())
    }
}

/// Fails on the first read.
struct Broken;

impl Read for Broken {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
    }
}

#[test]
fn binary_stream_publishes_latest_sample() {
    let samples = [
        Orientation::from_wxyz(1.0, 0.0, 0.0, 0.0),
        Orientation::from_wxyz(0.7071, 0.7071, 0.0, 0.0),
        Orientation::from_wxyz(0.5, -0.5, 0.5, -0.5),
    ];
    let mut stream = vec![0x13, 0x37];
    for sample in &samples {
        stream.extend_from_slice(&encode_frame(sample));
        stream.push(0x00);
    }

    let store = OrientationStore::new();
    let reader = Trickle {
        data: Cursor::new(stream),
        chunk: 5,
    };
    let client = ImuClient::spawn(reader, Protocol::Binary, store.clone()).unwrap();

    wait_until_stopped(&client);
    client.shutdown().unwrap();

    assert_eq!(store.read(), samples[2]);
    assert_eq!(store.publish_count(), 3);
}

#[test]
fn text_stream_skips_malformed_lines() {
    let stream = "IMU init\n\
                  Quat → w:0.9924 x:-0.0473 y:-0.1140 z:-0.0020\n\
                  Quat → w:bad x:0 y:0 z:0\n\
                  Quat → w:0 x:0 y:0 z:1\n\
                  Quat → w:0.1";

    let store = OrientationStore::new();
    let client = ImuClient::spawn(
        Cursor::new(stream.as_bytes().to_vec()),
        Protocol::Text,
        store.clone(),
    )
    .unwrap();

    wait_until_stopped(&client);
    client.shutdown().unwrap();

    assert_eq!(store.read().wxyz(), [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(store.publish_count(), 2);
}

#[test]
fn shutdown_interrupts_a_silent_link() {
    let reads = Arc::new(AtomicUsize::new(0));
    let store = OrientationStore::new();
    let client = ImuClient::spawn(
        Silent {
            reads: reads.clone(),
        },
        Protocol::Binary,
        store.clone(),
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(20));
    assert!(client.is_running());

    let started = Instant::now();
    client.shutdown().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(reads.load(Ordering::Relaxed) > 0);

    // No data: the store still holds the initial orientation.
    assert_eq!(store.read(), Orientation::default());
}

#[test]
fn read_error_is_terminal_and_reported() {
    let client = ImuClient::spawn(Broken, Protocol::Text, OrientationStore::new()).unwrap();

    wait_until_stopped(&client);
    let err = client.shutdown().unwrap_err();
    assert!(format!("{err:#}").contains("device unplugged"));
}
