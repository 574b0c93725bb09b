use std::time::Duration;

use tokio::net::UdpSocket;

use crate::transport::Session;


/// A session on an OS-assigned loopback port.
pub(crate) async fn loopback_session(timeout: Duration) -> Session {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    Session::from_socket(socket, timeout, 1024)
}
