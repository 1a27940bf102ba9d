use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

/// The reason the server exited
#[derive(Debug, Default)]
pub enum ServerExitReason {
    /// It was gracefully shutdown
    #[default]
    Normal,
    /// Polling the server socket for new connections failed somehow.
    Err(io::Error),
    /// The server panicked. The payload will contain the panic message.
    Panic(String),
}

/// Handle to a running fake HTTP server.
///
/// The handle identifies where the server is listening. Stopping it goes
/// through [`FakeServer::close`](crate::FakeServer::close), which also
/// re-opens the route table for registration.
#[derive(Debug)]
pub struct ServerHandle {
    pub(crate) address: SocketAddr,
    pub(crate) server_loop: JoinHandle<ServerExitReason>,
    pub(crate) server_waker: mio::Waker,
    pub(crate) observe_shutdown: Receiver<()>,
}

impl ServerHandle {
    /// Returns the address at which the server is currently listening
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the base URL clients should send requests to, e.g.
    /// `http://127.0.0.1:41953`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Stops the server, waiting for all in-flight requests to complete.
    pub(crate) fn stop(self) -> ServerExitReason {
        // Wake up the server thread.
        // It will be able to tell that it was woken up by the waker instead
        // of by a new readable Tcp connection.
        // If this call fails, just return.
        // We don't want to attempt to block on the `recv()` call in the next
        // line if its possible we didn't wake the server.
        // This means our graceful shutdown is "best effort".
        // Nothing we can do if some OS-level error happened.
        let Ok(()) = self.server_waker.wake() else {
            return ServerExitReason::Normal;
        };

        // Normally, after the server thread is woken up by the waker, it
        // will eventually rendezvous here.
        // Except if it exited due to an error or panicked, in which case
        // this call would return with an error. But we ignore it because we
        // only care that the server loop is stopped.
        let _ = self.observe_shutdown.recv();

        // The loop has already returned, so this join is immediate.
        match self.server_loop.join() {
            Ok(reason) => reason,
            Err(any) => match any.as_ref().downcast_ref::<String>() {
                Some(s) => ServerExitReason::Panic(s.clone()),
                None => match any.as_ref().downcast_ref::<&str>() {
                    Some(s) => ServerExitReason::Panic(s.to_string()),
                    None => ServerExitReason::Panic(String::new()),
                },
            },
        }
    }
}
