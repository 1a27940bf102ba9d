use crate::event_loop;
use crate::routes::{Expectation, RouteTable};
use crate::server_handle::{ServerExitReason, ServerHandle};
use std::collections::HashMap;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::{Arc, PoisonError, RwLock};

/// A programmable fake HTTP server.
///
/// Register canned responses with [`add_route`](FakeServer::add_route),
/// start the listener with [`start`](FakeServer::start), point an HTTP
/// client at [`ServerHandle::base_url`], and [`close`](FakeServer::close)
/// when done.
///
/// The route table can only be changed while the server is stopped;
/// registration calls made while it is running fail by returning `false`.
/// Once running, the table is read-only and shared by every in-flight
/// request handler, so serving needs no write locking.
///
/// One instance owns at most one listener at a time. Create one fake per
/// test fixture rather than sharing a global one.
pub struct FakeServer {
    table: Arc<RwLock<RouteTable>>,
    handle: Option<ServerHandle>,
}

impl FakeServer {
    /// Creates a stopped fake server with an empty route table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(RouteTable::new())),
            handle: None,
        }
    }

    /// Registers a canned response for the (route, method) pair.
    ///
    /// `route` is the request path with the leading `/` stripped, query
    /// string included: registering `test/query?q=1` only matches requests
    /// for `/test/query?q=1`, byte for byte.
    ///
    /// `request_params` lists parameters a request must carry to match;
    /// each may arrive via the query string, a form-encoded body, or a flat
    /// JSON object body. An empty map means no constraints.
    ///
    /// Registering the same pair twice keeps the second registration.
    /// Returns false if the server is currently running; no other
    /// validation is performed.
    pub fn add_route(
        &self,
        route: impl Into<String>,
        method: impl Into<String>,
        request_params: HashMap<String, String>,
        status: u16,
        body: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> bool {
        let expectation = Expectation {
            request_params,
            status,
            body: body.into(),
            headers,
        };

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(route.into(), method.into(), expectation)
    }

    /// Removes the registration for the (route, method) pair.
    ///
    /// Returns false if the server is running or the pair was never
    /// registered.
    pub fn remove_route(&self, route: &str, method: &str) -> bool {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(route, method)
    }

    /// Starts the listener on an OS-assigned localhost port.
    ///
    /// On success the route table is locked against mutation until
    /// [`close`](FakeServer::close). The returned handle exposes the
    /// listening address and base URL.
    pub fn start(&mut self) -> Result<&ServerHandle, io::Error> {
        self.start_on("localhost:0")
    }

    /// Starts the listener on an explicit address.
    pub fn start_on<A: ToSocketAddrs>(&mut self, addr: A) -> Result<&ServerHandle, io::Error> {
        if self.handle.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "the fake server is already running",
            ));
        }

        let address = addr
            .to_socket_addrs()?
            .next()
            .ok_or(io::Error::from(io::ErrorKind::InvalidInput))?;

        let handle = event_loop::create_handle(self.table.clone(), address)?;

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_started();

        Ok(self.handle.insert(handle))
    }

    /// Stops the listener, waiting for in-flight requests to finish, and
    /// re-opens the route table for mutation.
    ///
    /// Calling `close` on a stopped server is a no-op reported as
    /// [`ServerExitReason::Normal`].
    pub fn close(&mut self) -> ServerExitReason {
        let reason = match self.handle.take() {
            Some(handle) => handle.stop(),
            None => ServerExitReason::Normal,
        };

        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_stopped();

        reason
    }
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpStream};

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const NOT_FOUND: &str =
        "HTTP/1.1 404 Not Found\r\nContent-Length: 21\r\nConnection: close\r\n\r\n{\"error\":\"Not Found\"}";

    // Sends `raw_request` to the server at `address` and asserts the raw
    // response, byte for byte. Header order is deterministic: declared
    // headers sorted by name, then Content-Length and Connection.
    #[track_caller]
    fn assert_exchange(address: SocketAddr, raw_request: &str, expected_response: &str) {
        let mut stream = TcpStream::connect(address).unwrap();
        stream.write_all(raw_request.as_bytes()).unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();

        assert_eq!(response, expected_response);
    }

    #[test]
    fn end_to_end_register_start_request_stop() {
        init_logging();

        let mut server = FakeServer::new();
        assert!(server.add_route(
            "test/query:approve",
            "GET",
            HashMap::new(),
            200,
            r#"{"success":"true"}"#,
            HashMap::new(),
        ));

        let address = server.start().unwrap().address();

        assert_exchange(
            address,
            "GET /test/query:approve HTTP/1.1\r\nHost: fake\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 18\r\nConnection: close\r\n\r\n{\"success\":\"true\"}",
        );

        // Unregistered routes and methods get the fixed not-found payload.
        assert_exchange(
            address,
            "GET /test/other HTTP/1.1\r\nHost: fake\r\n\r\n",
            NOT_FOUND,
        );
        assert_exchange(
            address,
            "POST /test/query:approve HTTP/1.1\r\nHost: fake\r\nContent-Length: 0\r\n\r\n",
            NOT_FOUND,
        );

        assert_matches!(server.close(), ServerExitReason::Normal);

        // The table re-opens for registration after close.
        assert!(server.add_route("late", "GET", HashMap::new(), 200, "ok", HashMap::new()));
    }

    #[test]
    fn base_url_points_at_the_listener() {
        let mut server = FakeServer::new();
        let handle = server.start().unwrap();

        assert_eq!(handle.base_url(), format!("http://{}", handle.address()));
    }

    #[test]
    fn mutation_fails_while_running() {
        let mut server = FakeServer::new();
        assert!(server.add_route("a", "GET", HashMap::new(), 200, "ok", HashMap::new()));

        server.start().unwrap();

        assert!(!server.add_route("b", "GET", HashMap::new(), 200, "ok", HashMap::new()));
        assert!(!server.remove_route("a", "GET"));

        server.close();

        assert!(server.remove_route("a", "GET"));
    }

    #[test]
    fn starting_twice_is_an_error() {
        let mut server = FakeServer::new();
        server.start().unwrap();

        let err = server.start().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn required_parameters_match_form_or_json_sources() {
        init_logging();

        let mut server = FakeServer::new();
        let params = HashMap::from([("param1".to_string(), "value1".to_string())]);
        let headers = HashMap::from([("X-Fake".to_string(), "yes".to_string())]);
        server.add_route("test/query", "POST", params, 200, "matched", headers);

        let address = server.start().unwrap().address();

        let matched =
            "HTTP/1.1 200 OK\r\nX-Fake: yes\r\nContent-Length: 7\r\nConnection: close\r\n\r\nmatched";

        // Via a form-encoded body.
        assert_exchange(
            address,
            "POST /test/query HTTP/1.1\r\nHost: fake\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 13\r\n\r\nparam1=value1",
            matched,
        );

        // Via a JSON body.
        assert_exchange(
            address,
            "POST /test/query HTTP/1.1\r\nHost: fake\r\nContent-Type: application/json\r\nContent-Length: 19\r\n\r\n{\"param1\":\"value1\"}",
            matched,
        );

        // A wrong value misses, and the miss carries the expectation's
        // declared headers.
        assert_exchange(
            address,
            "POST /test/query HTTP/1.1\r\nHost: fake\r\nContent-Type: application/json\r\nContent-Length: 18\r\n\r\n{\"param1\":\"other\"}",
            "HTTP/1.1 404 Not Found\r\nX-Fake: yes\r\nContent-Length: 21\r\nConnection: close\r\n\r\n{\"error\":\"Not Found\"}",
        );
    }

    #[test]
    fn query_supplied_parameters_match_when_registered_with_the_query() {
        init_logging();

        let mut server = FakeServer::new();
        let params = HashMap::from([("param1".to_string(), "value1".to_string())]);
        server.add_route(
            "test/query?param1=value1",
            "GET",
            params,
            200,
            "ok",
            HashMap::new(),
        );

        let address = server.start().unwrap().address();

        assert_exchange(
            address,
            "GET /test/query?param1=value1 HTTP/1.1\r\nHost: fake\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        );
    }

    #[test]
    fn query_string_is_part_of_the_route_key() {
        init_logging();

        let mut server = FakeServer::new();
        server.add_route(
            "test/query?query1=1&query2=2",
            "GET",
            HashMap::new(),
            200,
            "with-query",
            HashMap::new(),
        );

        let address = server.start().unwrap().address();

        assert_exchange(
            address,
            "GET /test/query?query1=1&query2=2 HTTP/1.1\r\nHost: fake\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nwith-query",
        );

        // Same path without the query string is a different key.
        assert_exchange(
            address,
            "GET /test/query HTTP/1.1\r\nHost: fake\r\n\r\n",
            NOT_FOUND,
        );
    }

    #[test]
    fn unread_bodies_do_not_break_the_response() {
        init_logging();

        let mut server = FakeServer::new();
        let address = server.start().unwrap().address();

        // The route misses before the body is ever read; the client must
        // still receive the full not-found response.
        assert_exchange(
            address,
            "POST /nope HTTP/1.1\r\nHost: fake\r\nContent-Length: 11\r\n\r\nhello world",
            NOT_FOUND,
        );
    }

    #[test]
    fn dropping_a_running_server_stops_the_listener() {
        let address = {
            let mut server = FakeServer::new();
            let address = server.start().unwrap().address();

            // Still accepting while alive.
            assert!(TcpStream::connect(address).is_ok());
            address
        };

        assert!(TcpStream::connect(address).is_err());
    }
}
