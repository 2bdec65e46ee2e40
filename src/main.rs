use std::sync::Arc;

use anyhow::Context;

use elastci::config::Config;
use elastci::server::Server;
use elastci::shutdown;
use elastci::storage::{Database, ValueKind};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load();
    let token = shutdown::install_signal_handler()?;

    let db = Database::open(&cfg.database_path, token.clone())
        .or_else(|_| Database::create(&cfg.database_path, token.clone()))
        .context("failed to open or create database")?;

    let configuration = db
        .query(
            "SELECT http_port, http_threads FROM configuration",
            &[ValueKind::Int, ValueKind::Int],
            Vec::new(),
        )
        .context("could not read configuration from database")?;
    let port = configuration[0]
        .as_int()
        .context("http_port is not an integer")? as u16;
    let threads = configuration[1]
        .as_int()
        .context("http_threads is not an integer")? as usize;

    let db = Arc::new(db);
    let server = Server::start(port, threads, Arc::clone(&db), token.clone())?;

    token.wait();

    drop(server);
    Ok(())
}
