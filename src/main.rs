use anyhow::Context;
use clap::Parser;
use dialoguer::{Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use lucid::backend::Backend;
use lucid::cli::{build_options, Cli, Commands};
use lucid::config::{BackendKind, Config};
use lucid::notify::ConsoleNotifier;
use lucid::session::Credentials;
use lucid::{report, upload, Lucid};
use lucid_common::feedback::THANKS_MESSAGE;
use lucid_common::{present, FeedbackSection, JobRequest, Rating};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    match cli.command {
        Commands::Analyze {
            file,
            only,
            skip,
            login,
            name,
            email,
            password,
            report,
            feedback,
        } => {
            println!("🔍 LUCID - 画像解析\n");

            let backend = Backend::from_config(&config)?;
            let mut app = Lucid::new(config, backend, Arc::new(ConsoleNotifier));

            if login {
                let credentials = prompt_credentials(name, email, password)?;
                app.login(&credentials)?;
            }

            // 1. ファイル選択
            println!("[1/3] 画像を読み込み中...");
            let candidate = upload::candidate_from_path(&file)?;
            app.select_file(candidate)?;
            app.start_analysis(build_options(&only, &skip))?;

            // 2. 送信と待機
            println!("[2/3] 解析中... (Ctrl-Cで中止)");
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
                    .context("progress bar template")?
                    .progress_chars("=> "),
            );
            bar.set_message("Analyzing your image...");
            let outcome = app
                .process(&cancel, |value| bar.set_position(value.round() as u64))
                .await;
            bar.finish_and_clear();

            let Some(record) = outcome? else {
                return Ok(());
            };

            // 3. 結果表示
            println!("[3/3] 結果\n");
            if let Some(view) = app.results_view().await {
                print!("{}", view.render());
            }

            if let Some(path) = report {
                report::write_report(&record, &path)?;
                println!("\n✔ レポート出力: {}", path.display());
            }

            if feedback {
                prompt_feedback()?;
            }
        }

        Commands::Status { id } => {
            let backend = Backend::from_config(&config)?;
            let record = backend.records.get(&id).await?;
            println!("ID:       {}", record.id);
            println!("File:     {}", record.filename);
            println!("Status:   {}", record.status);
            if let Some(message) = &record.error_message {
                println!("Error:    {}", message);
            }
        }

        Commands::Results { id, report } => {
            let backend = Backend::from_config(&config)?;
            let mut app = Lucid::new(config, backend, Arc::new(ConsoleNotifier));
            let record = app.open_results(&id).await?;

            if let Some(view) = app.results_view().await {
                print!("{}", view.render());
            }

            if let Some(path) = report {
                report::write_report(&record, &path)?;
                println!("\n✔ レポート出力: {}", path.display());
            }
        }

        Commands::Work { id } => {
            if config.backend == BackendKind::Memory {
                anyhow::bail!("memory backend does not keep records between runs");
            }
            let backend = Backend::from_config(&config)?;
            let record = backend.records.get(&id).await?;

            println!("⚙ ワーカー実行: {} ({})", record.id, record.filename);
            backend
                .worker()
                .process(&JobRequest::new(record.id.clone(), record.analysis_options))
                .await?;

            let record = backend.records.get(&id).await?;
            for row in present(&record) {
                println!("  {}: {}", row.label, row.value);
            }
            println!("\n✅ 完了");
        }

        Commands::Config {
            show,
            set_backend,
            set_supabase_url,
            set_supabase_key,
        } => {
            // --backend での一時切り替えは保存しない
            let mut config = Config::load()?;
            let mut changed = false;

            if let Some(backend) = set_backend {
                config.backend = backend;
                changed = true;
                println!("✔ バックエンドを設定しました: {}", backend);
            }
            if let Some(url) = set_supabase_url {
                config.supabase_url = Some(url);
                changed = true;
                println!("✔ Supabase URLを設定しました");
            }
            if let Some(key) = set_supabase_key {
                config.supabase_anon_key = Some(key);
                changed = true;
                println!("✔ Supabase キーを設定しました");
            }
            if changed {
                config.save()?;
            }

            if show || !changed {
                print_config(&config, &Config::config_path()?);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "lucid=debug" } else { "lucid=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_config(config: &Config, path: &Path) {
    println!("設定: {}", path.display());
    println!("  バックエンド: {}", config.backend);
    match config.data_dir() {
        Ok(dir) => println!("  データ保存先: {}", dir.display()),
        Err(e) => println!("  データ保存先: ({})", e),
    }
    println!("  Supabase URL: {}", config.supabase_url.as_deref().unwrap_or("未設定"));
    println!(
        "  Supabase キー: {}",
        if config.supabase_anon_key.is_some() { "設定済み" } else { "未設定" }
    );
    println!("  バケット: {}", config.bucket);
    println!("  ポーリング間隔: {}ms", config.poll_interval_ms);
}

fn prompt_credentials(
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<Credentials> {
    let name = match name {
        Some(name) => name,
        None => Input::<String>::new().with_prompt("Name").interact_text()?,
    };
    let email = match email {
        Some(email) => email,
        None => Input::<String>::new().with_prompt("Email").interact_text()?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };
    Ok(Credentials::new(name, email, password))
}

fn prompt_feedback() -> anyhow::Result<()> {
    let items: Vec<String> = Rating::ALL
        .iter()
        .map(|r| format!("{} {}", r.emoji(), r.label()))
        .collect();

    let mut section = FeedbackSection::new();
    let choice = Select::new()
        .with_prompt("How satisfied are you with the results?")
        .items(&items)
        .default(2)
        .interact_opt()?;

    if let Some(rating) = choice.and_then(|i| Rating::ALL.get(i).copied()) {
        if section.submit(rating) {
            println!("✔ {}", THANKS_MESSAGE);
        }
    }
    Ok(())
}
