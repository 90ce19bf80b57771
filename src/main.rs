//! agentexec 命令行入口
//!
//! 用法：`agentexec [--config <path>] <用户输入...>`
//! 加载配置、初始化日志、注册演示能力与配置中的 Agent，执行一次请求并以 JSON 打印最终响应。

use std::path::PathBuf;

use anyhow::{bail, Context};
use agentexec::config::load_config;
use agentexec::{observability, ExecutorBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut config_path: Option<PathBuf> = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config requires a path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            words.push(arg);
        }
    }
    let user_input = words.join(" ");
    if user_input.trim().is_empty() {
        bail!("usage: agentexec [--config <path>] <request>");
    }

    let cfg = load_config(config_path).context("Failed to load config")?;
    let schema = cfg.schema().context("Invalid executor config")?;
    let executor = ExecutorBuilder::from_config(&cfg)
        .context("Failed to build executor")?
        .build();

    let response = executor
        .execute(&schema, &user_input)
        .await
        .context("Request failed")?;

    let json = serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}
