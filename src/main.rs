use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

mod args;
use args::Args;

mod auth;
mod backend;
mod context;
mod handlers;
mod routes;
mod session;
mod task;
mod tasklist;
mod time;
mod user;
mod views;

use backend::Backend;
use session::SessionKey;
use tasklist::TaskList;

#[tokio::main]
async fn main() -> ExitCode {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| "tasklist=info".into());
    pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .init();

    let args = Args::parse();

    let addr = match args.addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("couldn't parse listen address: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    let secret = match args.secret() {
        Ok(secret) => secret,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let key = Arc::new(SessionKey::new(secret, args.secure()));

    let Ok(backend) = Backend::new(args.data_dir()).await else {
        error!("couldn't open the store in {:?}", args.data_dir());
        return ExitCode::FAILURE;
    };
    let list = Arc::new(TaskList::new(backend));

    let routes = routes::routes(list, key);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("couldn't listen for ctrl-c: {e}");
        }
        info!("shutting down");
    };

    let server = match warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown) {
        Ok((addr, server)) => {
            info!("listening on {addr}");
            server
        }
        Err(e) => {
            error!("couldn't bind {addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    server.await;

    ExitCode::SUCCESS
}
