use std::net::{SocketAddr, TcpListener};

/// Gets a new socket address allocated by the OS.
///
/// The listener backing the allocation is dropped before returning, so the
/// address is free for the test to bind or to treat as a dead endpoint.
pub fn get_unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("read local addr");
    drop(listener);
    addr
}
