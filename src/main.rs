use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use density_cube_service::app_state::AppState;
use density_cube_service::config::ServiceConfig;
use density_cube_service::performance::PerformanceStore;
use density_cube_service::probe::IntensityProbe;
use density_cube_service::rasterizer::DensityRasterizer;
use density_cube_service::rebuild::DensityCube;
use density_cube_service::routes;
use density_cube_service::task::TaskStore;
use density_cube_service::utils::parser_registry::ParserRegistry;

/// 粒子数据 -> 密度立方体服务
#[derive(Parser, Debug)]
#[command(name = "density-cube-service", version)]
struct Cli {
    /// JSON 配置文件路径
    #[arg(long)]
    config: Option<PathBuf>,

    /// 日志级别 (trace, debug, info, warn, error)，其他值直接报错
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServiceConfig::load(cli.config.as_deref())?;

    // 初始化解析器注册表
    let parser_registry = Arc::new(ParserRegistry::new());
    info!("已注册的解析器: {:?}", parser_registry.supported_extensions());

    let task_store = Arc::new(TaskStore::with_ttl(config.task_ttl()));
    let performance_store = Arc::new(PerformanceStore::with_ttl(config.task_ttl()));
    let rasterizer = DensityRasterizer::new(config.raster.clone())?;
    let density_cube = Arc::new(DensityCube::new(
        rasterizer,
        task_store.clone(),
        performance_store.clone(),
    ));

    let app_state = web::Data::new(AppState {
        parser_registry,
        resource_dir: config.resource_dir.clone(),
        value_channel: config.value_channel.clone(),
        density_cube,
        probe: IntensityProbe::from_config(&config.probe, &config.pulse),
    });

    info!("任务 TTL: {} 分钟", task_store.default_ttl().as_secs() / 60);

    // 启动后台清理任务：定期清理过期的任务和性能记录
    let cleanup_interval = config.cleanup_interval();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let cleaned_count = task_store.cleanup_expired();
            performance_store.cleanup_expired();
            if cleaned_count > 0 {
                info!(
                    "[清理任务] 清理了 {} 个过期任务，当前剩余: {} 个任务",
                    cleaned_count,
                    task_store.task_count()
                );
            }
        }
    });

    info!("服务器启动在 http://{}:{}", config.host, config.port);
    info!("资源目录: {}", config.resource_dir);
    info!(
        "网格分辨率: {}, 标量列: {}",
        config.raster.resolution, config.value_channel
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
