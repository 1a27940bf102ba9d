use crate::connection::Connection;
use crate::responder;
use crate::routes::RouteTable;
use crate::server_handle::{ServerExitReason, ServerHandle};
use mio::event::Events;
use mio::net::TcpListener;
use mio::{Interest, Poll, Token, Waker};
use std::io;
use std::net::SocketAddr;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, RwLock};
use std::thread;

// Tokens used for the MIO event loop
const SERVER: Token = Token(0);
const SHUTDOWN: Token = Token(1);

struct EventLoop {
    socket: TcpListener,
    table: Arc<RwLock<RouteTable>>,
    poll: Poll,
    events: Events,
    signal_shutdown: SyncSender<()>,
}

pub(crate) fn create_handle(
    table: Arc<RwLock<RouteTable>>,
    address: SocketAddr,
) -> Result<ServerHandle, io::Error> {
    // Graceful shutdown means "finish all in-flight requests, then stop the
    // thread pool", and that requires waking up the accept call when it is
    // time to shut down. The standard library cannot interrupt a blocking
    // `accept()`, so the server thread blocks on `mio::Poll::poll()`
    // instead, and `ServerHandle::stop` wakes it with a `Waker`. A bounded
    // channel of size 0 then acts as a rendezvous point between the server
    // thread and the stopping thread.
    let mut socket = TcpListener::bind(address)?;

    let address = socket.local_addr()?;

    log::info!("Fake HTTP server listening on {address}");

    let poll = Poll::new()?;

    let events = Events::with_capacity(128);

    let server_waker = Waker::new(poll.registry(), SHUTDOWN)?;

    poll.registry()
        .register(&mut socket, SERVER, Interest::READABLE)?;

    let (signal_shutdown, observe_shutdown) = sync_channel(0);

    let event_loop = EventLoop {
        socket,
        table,
        poll,
        events,
        signal_shutdown,
    };

    let handle = thread::spawn(move || start(event_loop));

    Ok(ServerHandle {
        address,
        server_loop: handle,
        server_waker,
        observe_shutdown,
    })
}

fn start(mut evloop: EventLoop) -> ServerExitReason {
    // `shutdown_threadpool` should always be called before exiting this
    // function, regardless of cause.
    // This will ensure active threads finish their work.
    let pool = threadpool::Builder::new().build();

    loop {
        match evloop.poll.poll(&mut evloop.events, None) {
            Ok(_) => {}
            Err(err) => {
                log::warn!(error:err = err; "Poll call failed. Server loop will exit");
                shutdown_threadpool(pool);
                return ServerExitReason::Err(err);
            }
        };

        for event in evloop.events.iter() {
            match event.token() {
                SERVER => loop {
                    match evloop.socket.accept() {
                        Ok((stream, _)) => {
                            let connection = match Connection::try_from(stream) {
                                Ok(c) => c,
                                Err(err) => {
                                    log::warn!(error:err = err; "Failed to prepare an accepted connection. Dropping it");
                                    continue;
                                }
                            };
                            pool.execute({
                                let table = evloop.table.clone();
                                move || {
                                    responder::handle_connection(connection, table);
                                }
                            });
                        }
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(err) => {
                            log::warn!(error:err = err; "Socket accept call failed. Server loop will exit");
                            shutdown_threadpool(pool);
                            return ServerExitReason::Err(err);
                        }
                    }
                },
                SHUTDOWN => {
                    shutdown_threadpool(pool);
                    if evloop.signal_shutdown.send(()).is_err() {
                        // The only way this happens is if the stopping thread
                        // called `server_waker.wake()` then immediately
                        // dropped the `observe_shutdown` receiver such that
                        // this fails to send.
                        //
                        // But that cannot be, since we don't do that ... and
                        // those properties are not part of the public API.
                        //
                        // That said if somehow, it does happen, I do still
                        // want to know
                        log::error!(
                            "unreachable code reached! failed to notify stopping thread of shutdown."
                        );
                        unreachable!("failed to notify stopping thread of shutdown");
                    }
                    return ServerExitReason::Normal;
                }
                _ => unreachable!(),
            }
        }
    }
}

fn shutdown_threadpool(pool: threadpool::ThreadPool) {
    pool.join();
    drop(pool);
}
