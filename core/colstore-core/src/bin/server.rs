//! The column-store server binary: restores `dbdump.bin` if present, then
//! accepts client connections on a fixed UNIX-domain socket path until a
//! client issues `shutdown` (section 6's "Environment": "a fixed path. No
//! environment variables, no CLI flags.").
//!
//! Grounded in `original_source/server.c`'s `main`.

use colstore_core::engine::persistence::{self, DUMP_FILE_NAME};
use colstore_core::engine::Engine;
use colstore_core::net::server::DEFAULT_SOCK_PATH;
use colstore_core::net::Server;

fn main() {
    colstore_core::logging::init();

    let mut engine = Engine::new();
    if let Err(err) = persistence::load_from_path(&mut engine, DUMP_FILE_NAME) {
        eprintln!("failed to load {DUMP_FILE_NAME}: {err}");
        std::process::exit(1);
    }

    let server = match Server::bind(DEFAULT_SOCK_PATH) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to bind {DEFAULT_SOCK_PATH}: {err}");
            std::process::exit(1);
        }
    };

    #[cfg(feature = "logging")]
    tracing::info!(socket = DEFAULT_SOCK_PATH, "server listening");

    if let Err(err) = server.run(&mut engine, DUMP_FILE_NAME) {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}
