use crate::connection::Connection;
use crate::request::Request;
use crate::response::Response;
use crate::routes::RouteTable;
use crate::status;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

// Handles one HTTP connection: read the request, match it against the route
// table, write exactly one response. Transport failures while reading the
// head are logged and the connection dropped without a response.
pub(crate) fn handle_connection(mut conn: Connection, table: Arc<RwLock<RouteTable>>) {
    let mut request = match conn.read_request() {
        Ok(request) => request,
        Err(e) => {
            log::warn!(error:err = e; "Error reading HTTP request. Closing connection");
            return;
        }
    };

    let response = respond(&mut conn, &mut request, &table);

    // Leave no request bytes unread before responding, or closing the
    // socket can reset it under the peer.
    if let Err(e) = conn.discard(request.unread_body_len()) {
        log::debug!(error:err = e; "Failed to drain the unread request body");
    }

    if let Err(e) = conn.write_response(&response) {
        log::warn!(error:err = e; "Error writing HTTP response. Closing connection");
    }
}

// Translates one request into one response using the table's current
// contents:
//
// 1. Route key = target minus one leading `/`, query string included.
// 2. Unknown route or method: the fixed not-found response, empty headers.
// 3. Read the body; an I/O failure becomes a 500 carrying the error text
//    and the matched expectation's headers.
// 4. Every required parameter must be supplied, form/query source first,
//    JSON body second. A miss is the not-found response carrying the
//    expectation's headers.
// 5. Otherwise: the expectation's headers, status and body.
fn respond(conn: &mut Connection, request: &mut Request, table: &RwLock<RouteTable>) -> Response {
    let route_key = request.route_key().to_string();

    let expectation = {
        let table = table.read().unwrap_or_else(PoisonError::into_inner);

        let Some(methods) = table.methods(&route_key) else {
            log::debug!("No route registered for '{route_key}'");
            return Response::not_found(&HashMap::new());
        };

        let Some(expectation) = methods.get(&request.method) else {
            log::debug!(
                "Route '{route_key}' is not registered for method '{}'",
                request.method
            );
            return Response::not_found(&HashMap::new());
        };

        expectation.clone()
    };

    let body = conn.read_body(request.content_length());
    request.body_read = true;

    match body {
        Ok(body) => request.body = body,
        Err(e) => {
            log::warn!(error:err = e; "Error reading the request body");
            let payload = serde_json::json!({ "error": e.to_string() });
            return Response::default()
                .set_status(status::INTERNAL_SERVER_ERROR)
                .set_headers(&expectation.headers)
                .set_body(payload.to_string().into_bytes());
        }
    }

    for (name, required) in &expectation.request_params {
        if request.param(name) != Some(required.as_str()) {
            log::debug!("Route '{route_key}' requires '{name}={required}'");
            return Response::not_found(&expectation.headers);
        }
    }

    Response::default()
        .set_status(expectation.status)
        .set_headers(&expectation.headers)
        .set_body(expectation.body.clone().into_bytes())
}
