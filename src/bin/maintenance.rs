use std::env;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use diesel::Connection;
use tracing_subscriber::EnvFilter;

use lotes::{
    auth::password,
    config::AppConfig,
    db,
    domain::{LoteStatus, LoteTipo, Role},
    ingest,
    store::{
        lotes::{self as lote_store, normalize_numero, NewLote, NewLoteItem},
        users::{self, BOOTSTRAP_NAME},
    },
    views::{
        group_by_cfc,
        reports::{report_lotes, report_options, ReportFilter, StatusCounts},
        CfcFilter, Viewer,
    },
};

const USAGE: &str = "Usage:
  maintenance hash-password <password>
  maintenance import <spreadsheet> [numero]
  maintenance report [--cfc NAME]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("hash-password") => {
            let raw = args.get(1).ok_or_else(|| anyhow!("missing password\n{USAGE}"))?;
            println!("{}", password::hash_password(raw)?);
        }
        Some("import") => {
            let file = args.get(1).ok_or_else(|| anyhow!("missing spreadsheet\n{USAGE}"))?;
            import(Path::new(file), args.get(2).map(String::as_str))?;
        }
        Some("report") => {
            let cfc = match (args.get(1).map(String::as_str), args.get(2)) {
                (None, _) => CfcFilter::All,
                (Some("--cfc"), Some(name)) => CfcFilter::parse(name),
                _ => bail!("invalid report arguments\n{USAGE}"),
            };
            report(cfc)?;
        }
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::SqlitePool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database = %config.database_path(),
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;
    db::run_migrations(&mut conn)?;
    users::ensure_bootstrap_admin(&mut conn)?;
    Ok(pool)
}

fn import(file: &Path, numero: Option<&str>) -> Result<()> {
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("invalid file name {}", file.display()))?;
    let bytes = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let rows = ingest::read_rows(&bytes, file_name)?;
    let numero = numero
        .map(str::to_string)
        .or_else(|| ingest::suggested_numero(&rows))
        .map(|value| normalize_numero(&value))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("no lote number given and cell B2 is empty"))?;
    let tipo = LoteTipo::from_numero(&numero);
    let items = ingest::extract_items(&rows, tipo);
    let summary = ingest::summarize(&items);

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let new_lote = NewLote {
        numero,
        status: LoteStatus::Pendente,
        criado_por: BOOTSTRAP_NAME.to_string(),
        items: items.into_iter().map(NewLoteItem::from).collect(),
        pdf_filename: None,
    };
    let (lote, provisioned) = conn.transaction::<_, anyhow::Error, _>(|conn| {
        let lote = lote_store::create_lote(conn, &new_lote)?;
        let provisioned = users::provision_cfc_users(conn, &summary.cfcs)?;
        Ok((lote, provisioned))
    })?;

    println!(
        "Imported lote {} ({}) with {} items: {} from CFCs, {} particular.",
        lote.numero, lote.tipo, summary.total, summary.cfc_items, summary.particular_items
    );
    for user in &provisioned {
        println!("  created user {} for {}", user.username, user.name);
    }
    Ok(())
}

fn report(cfc: CfcFilter) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let lotes = lote_store::list_lotes(&mut conn)?;
    let viewer = Viewer::new(Role::Admin, None);

    for tipo in [LoteTipo::Cnh, LoteTipo::Pid] {
        let filter = ReportFilter {
            cfc: cfc.clone(),
            ..ReportFilter::for_tipo(tipo)
        };
        let selected = report_lotes(&viewer, &lotes, &filter);
        let counts = StatusCounts::of(&selected);

        println!(
            "{tipo}: {} lotes ({} pendente, {} em separacao, {} recebido)",
            counts.total, counts.pendente, counts.em_separacao, counts.recebido
        );
        let groups = group_by_cfc(selected.iter().flat_map(|lote| lote.items.iter()));
        for (group, items) in groups {
            println!("  {group}: {}", items.len());
        }
    }

    let options = report_options(&lotes);
    println!("CFCs: {}", options.cfcs.join(", "));
    println!("Operators: {}", options.operadores.join(", "));
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
