//! Ragloop 命令行
//!
//! 用法：ragloop [--conversation ID] [--principal ID] [--config PATH]
//! 每行输入跑一轮对话，token 到达即打印；/repair 修复历史，/history 打印检查点，/quit 退出。

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context};
use ragloop::config::load_config;
use ragloop::{EngineBuilder, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

struct Args {
    conversation: String,
    principal: String,
    config: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        conversation: uuid::Uuid::new_v4().to_string(),
        principal: "local".to_string(),
        config: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let mut value = || it.next().with_context(|| format!("missing value for {flag}"));
        match flag.as_str() {
            "--conversation" => args.conversation = value()?,
            "--principal" => args.principal = value()?,
            "--config" => args.config = Some(PathBuf::from(value()?)),
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ragloop::observability::init();

    let args = parse_args()?;
    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let engine = EngineBuilder::new(cfg)
        .build()
        .context("Failed to build engine")?;

    println!("conversation: {}", args.conversation);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" => break,
            "/repair" => {
                let report = engine.repair_history(&args.conversation).await?;
                println!(
                    "history repaired: {} -> {} messages ({} dropped)",
                    report.before,
                    report.after,
                    report.dropped()
                );
            }
            "/history" => {
                for msg in engine.history(&args.conversation).await? {
                    println!("{}", serde_json::to_string(&msg)?);
                }
            }
            _ => {
                let mut stream = engine.run_turn(
                    args.conversation.clone(),
                    input.to_string(),
                    args.principal.as_str(),
                );
                while let Some(event) = stream.next_event().await {
                    match event {
                        StreamEvent::Token { content } => {
                            print!("{content}");
                            std::io::stdout().flush()?;
                        }
                        StreamEvent::Done { .. } => println!(),
                        StreamEvent::Error { detail } => eprintln!("\nerror: {detail}"),
                    }
                }
            }
        }
    }
    Ok(())
}
