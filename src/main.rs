use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
pub mod mappings;
mod services;
mod utils;

use config::Config;
use services::{
    create_window_adapter, ActionRouter, BackgroundService, Broadcaster, Engines, EventNotifier,
    FocusNavigator, HotkeyDispatcher, PushBroadcaster, WindowWatcher,
};

#[derive(Parser, Debug)]
#[command(name = "mbox")]
#[command(about = "Переключение фокуса и тиражирование ввода между окнами одного приложения")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "mbox.toml")]
    config: String,

    /// Режим сухого запуска (симулированный рабочий стол, без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает значение из конфигурации)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let mut config = Config::load(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    // Инициализация системы логирования
    init_tracing(&config.logging.level, &config.logging.format)?;

    info!("Запуск mbox v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    } else if let Err(e) = utils::check_permissions() {
        error!("{}", e);
        for line in utils::setup_commands() {
            error!("{}", line);
        }
        return Err(e.into());
    }

    // Инициализация компонентов (один адаптер оконной системы на все движки)
    let adapter = create_window_adapter(&config, args.dry_run)?;
    let notifier = EventNotifier::default();
    let engines = Engines {
        adapter: adapter.clone(),
        navigator: Arc::new(FocusNavigator::new(adapter.clone())),
        broadcaster: Arc::new(Broadcaster::new(adapter.clone(), config.broadcast.cooldown_ms)),
        push: Arc::new(PushBroadcaster::new(
            adapter.clone(),
            notifier.clone(),
            config.push_to_broadcast.timing(),
        )),
    };
    let dispatcher = Arc::new(HotkeyDispatcher::new(adapter.clone(), notifier.clone())?);

    let bindings = config.hotkey_bindings();
    let registered = bindings
        .into_iter()
        .filter(|binding| {
            let ok = dispatcher.register(binding.clone());
            if !ok {
                warn!("Не удалось зарегистрировать горячую клавишу {}", binding);
            }
            ok
        })
        .count();
    info!("Зарегистрировано горячих клавиш: {}", registered);

    let shutdown = CancellationToken::new();
    let (windows_tx, windows_rx) = unbounded_channel();

    let watcher: Box<dyn BackgroundService + Send> = Box::new(WindowWatcher::new(
        adapter.clone(),
        &config.target.process_name,
        config.target.polling_interval_ms,
        windows_tx,
        shutdown.clone(),
    ));
    let router: Box<dyn BackgroundService + Send> = Box::new(
        ActionRouter::new(
            engines.clone(),
            &config.presets,
            notifier.subscribe(),
            windows_rx,
            shutdown.clone(),
        )
        .with_push_trigger(
            config.push_to_broadcast.trigger(),
            config.push_to_broadcast.trigger_poll_ms,
        ),
    );

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let mut handles = Vec::new();
    match adapter.take_hotkey_messages() {
        Some(messages) => {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.pump_messages(messages, shutdown).await;
            }));
        }
        None => warn!("Канал уведомлений о горячих клавишах недоступен"),
    }
    for service in [watcher, router] {
        handles.push(tokio::spawn(async move {
            let name = service.name();
            if let Err(e) = service.run().await {
                error!("Ошибка в {}: {}", name, e);
            }
        }));
    }

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Отмена текущих рассылок и остановка сервисов
    shutdown.cancel();
    engines.push.disarm();
    dispatcher.dispose();

    for handle in &handles {
        handle.abort();
    }

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("mbox завершил работу");
    Ok(())
}

fn init_tracing(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
