/*
 * APIGW Inventory - API gateway folder inventory
 * Copyright (c) 2024 APIGW Inventory Project
 * 
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use apigw_inventory::{
    config::{Config, InventoryMode},
    error::AppResult,
    export::export_report,
    services::{
        DependencyTraversal, GatewayContext, GraphmanClient, QueryTraversal, RestmanClient,
        TracingSink,
    },
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 盘点网关上各根文件夹下发布的全部API
#[derive(Debug, Parser)]
#[command(name = "apigw-inventory", version)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// 网关地址，例如 10.112.0.89:8443
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(long, env = "APIGW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// 根文件夹，分号分隔
    #[arg(short, long)]
    folders: Option<String>,

    #[arg(short, long, value_enum)]
    mode: Option<InventoryMode>,

    /// 输出CSV路径
    #[arg(short, long)]
    output: Option<String>,

    /// 只测试网关连接
    #[arg(long)]
    check: bool,

    /// 依赖图模式下跳过 resolutionPath 获取
    #[arg(long)]
    no_resolve_paths: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.gateway.host = host;
        }
        if let Some(username) = self.username {
            config.gateway.username = username;
        }
        if let Some(password) = self.password {
            config.gateway.password = password;
        }
        if let Some(folders) = self.folders {
            config.inventory.folders = folders;
        }
        if let Some(mode) = self.mode {
            config.inventory.mode = mode;
        }
        if let Some(output) = self.output {
            config.inventory.output = Some(output);
        }
        if self.no_resolve_paths {
            config.inventory.resolve_paths = false;
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apigw_inventory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let check_only = cli.check;
    let mut config = Config::load_or_init(&cli.config)?;
    cli.apply(&mut config);

    // Ctrl-C 取消当前运行，已收集的结果照常导出
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("收到中断信号，正在停止盘点");
            signal_token.cancel();
        }
    });

    let ctx = GatewayContext::from_config(&config, cancel.clone(), Arc::new(TracingSink))?;

    if check_only {
        let client = RestmanClient::new(ctx, &config.retry);
        client.health_check().await?;
        tracing::info!("网关连接正常: {}", config.base_url());
        return Ok(());
    }

    config.validate()?;
    let targets = config.targets();
    tracing::info!(
        "网关: {}，模式: {}，根文件夹: {:?}",
        config.base_url(),
        config.inventory.mode,
        targets
    );

    let events = ctx.shared_events();
    let report = match config.inventory.mode {
        InventoryMode::Dependency => {
            let client = RestmanClient::new(ctx, &config.retry);
            DependencyTraversal::new(client, cancel, events)
                .with_resolution_paths(config.inventory.resolve_paths)
                .run(&targets)
                .await
        }
        InventoryMode::Query => {
            let client = GraphmanClient::new(ctx, &config.retry.query);
            QueryTraversal::new(client, cancel, events)
                .run(&targets)
                .await
        }
    };

    let files = export_report(&report, config.output_path())?;
    if report.cancelled {
        tracing::warn!("盘点被中断，导出的结果不完整: {}", files.csv.display());
    } else {
        tracing::info!(
            "✅ 盘点完成，共 {} 个API，耗时 {:.1} 秒",
            report.records.len(),
            report.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
