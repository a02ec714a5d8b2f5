use std::{process, sync::Arc};

use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{error::AppError, menu::MenuService, page::PageService},
    cache::{Optimizer, OptimizerConfig},
    config,
    infra::{
        preload::{AssetPreloader, HttpPreloader, NoopPreloader, PreloadPriority},
        telemetry,
        transport::GraphqlTransport,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let transport = Arc::new(GraphqlTransport::new(&settings.transport)?);
    info!(
        target = "vitrine::startup",
        endpoint = %transport.endpoint(),
        tenant = settings.transport.tenant.as_deref().unwrap_or("-"),
        "Transport configured"
    );
    let optimizer = Arc::new(Optimizer::new(
        OptimizerConfig::from(&settings.cache),
        transport,
    ));

    let result = match cli_args.command {
        config::Command::Page(args) => run_page(&settings, Arc::clone(&optimizer), args).await,
        config::Command::Menu(args) => run_menu(&settings, Arc::clone(&optimizer), args).await,
    };

    optimizer.flush_now().await;
    result
}

async fn run_page(
    settings: &config::Settings,
    optimizer: Arc<Optimizer>,
    args: config::PageArgs,
) -> Result<(), AppError> {
    let preloader: Arc<dyn AssetPreloader> = if args.preload {
        Arc::new(HttpPreloader::new()?)
    } else {
        Arc::new(NoopPreloader)
    };
    let service = PageService::new(Arc::clone(&optimizer), settings.pages.clone(), preloader);

    let mut load = service.load_page(&args.page_id).await?;
    for _ in 1..args.repeat {
        load = service.load_page(&args.page_id).await?;
    }

    let preload = if args.preload {
        Some(service.preload_media(&load, PreloadPriority::High).await)
    } else {
        None
    };

    print_json(&json!({
        "page": {
            "id": load.page.id,
            "slug": load.page.slug,
            "title": load.page.title,
            "sections": load.sections.len(),
            "media_sections": load.media_sections,
        },
        "preload": preload,
        "stats": optimizer.stats(),
    }))
}

async fn run_menu(
    settings: &config::Settings,
    optimizer: Arc<Optimizer>,
    args: config::MenuArgs,
) -> Result<(), AppError> {
    let service = MenuService::new(Arc::clone(&optimizer), settings.pages.menu_ttl);
    let menus = service.load_menus(&args.locations).await?;

    print_json(&json!({
        "menus": menus,
        "stats": optimizer.stats(),
    }))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
