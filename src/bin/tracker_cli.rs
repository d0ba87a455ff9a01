use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use finance_tracker::auth::{issue_token, JwtKeys};
use finance_tracker::client::notify::{SignOutFlag, StaticToken};
use finance_tracker::client::{
    Notice, NoticeLevel, Notifier, QueryCache, RequestGateway, TransactionFeed, TransactionsClient,
};
use finance_tracker::logging;
use finance_tracker::models::{
    Category, CreateTransaction, SortField, SortOrder, TransactionQuery, TransactionRecord,
    UpdateTransaction, UpsertUser, User,
};
use finance_tracker::money;

/// Command line client for the finance tracker API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the API, including its prefix.
    #[arg(long, env = "TRACKER_API_URL", default_value = "http://localhost:3000/api")]
    api_url: String,

    /// Bearer token sent with every request.
    #[arg(long, env = "TRACKER_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List transactions, newest first by default.
    List {
        #[arg(long, default_value_t = 30)]
        limit: u32,
        #[arg(long, value_parser = parse_order)]
        order: Option<SortOrder>,
        #[arg(long, value_parser = parse_sort_field)]
        sort_by: Option<SortField>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        /// Keep loading further pages, up to this many in total.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show income, expense and balance totals.
    Summary,
    Show {
        id: Uuid,
    },
    Add {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: Category,
        /// Calendar date, YYYY-MM-DD.
        #[arg(long)]
        date: NaiveDate,
    },
    Edit {
        id: Uuid,
        #[arg(long)]
        amount: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Delete {
        id: Uuid,
    },
    /// Create or update the profile the token belongs to.
    Profile {
        #[arg(long)]
        firstname: String,
        #[arg(long)]
        lastname: String,
        #[arg(long)]
        email: String,
    },
    /// Sign a development token with the server's secret.
    IssueToken {
        #[arg(long)]
        user: String,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

fn parse_order(raw: &str) -> Result<SortOrder, String> {
    match raw {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        other => Err(format!("expected asc or desc, got {:?}", other)),
    }
}

fn parse_sort_field(raw: &str) -> Result<SortField, String> {
    match raw {
        "updatedAt" => Ok(SortField::UpdatedAt),
        "createdAt" => Ok(SortField::CreatedAt),
        "amount" => Ok(SortField::Amount),
        other => Err(format!("expected updatedAt, createdAt or amount, got {:?}", other)),
    }
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}", tag, notice.text);
    }
}

fn print_row(t: &TransactionRecord) {
    println!(
        "{}  {}  {:<7}  {:>12}  {}",
        t.id,
        t.transaction_date,
        t.category.as_str(),
        money::round_currency(&t.amount).to_string(),
        t.description
    );
}

fn parse_amount(raw: &str) -> anyhow::Result<bigdecimal::BigDecimal> {
    money::parse_decimal(raw).ok_or_else(|| anyhow!("{:?} is not a number", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_cli_logging();
    let args = Args::parse();

    if let Command::IssueToken { user, secret, hours } = &args.command {
        let keys = JwtKeys::from_secret(secret);
        let token = issue_token(user, chrono::Duration::hours(*hours), &keys)
            .map_err(|e| anyhow!("{}", e))?;
        println!("{}", token);
        return Ok(());
    }

    let gateway = RequestGateway::new(
        args.api_url.clone(),
        Arc::new(StaticToken::new(args.token.clone())),
        Arc::new(SignOutFlag::new()),
        Arc::new(ConsoleNotifier),
    );
    let client = TransactionsClient::new(gateway.clone(), QueryCache::new());

    match args.command {
        Command::List {
            limit,
            order,
            sort_by,
            search,
            category,
            year,
            month,
            pages,
        } => {
            let query = TransactionQuery {
                page: 1,
                limit,
                order: order.unwrap_or_default(),
                sort_by: sort_by.unwrap_or_default(),
                search: search.unwrap_or_default(),
                category,
                year,
                month,
            };
            let mut feed = TransactionFeed::new(query);
            client.load(&mut feed).await?;
            for _ in 1..pages.max(1) {
                if !client.load_more(&mut feed).await? {
                    break;
                }
            }
            for t in feed.items() {
                print_row(t);
            }
            if let Some(meta) = feed.meta() {
                println!(
                    "page {} of {} ({} total){}",
                    meta.current_page,
                    meta.last_page,
                    meta.total,
                    if meta.has_more_pages { ", more available" } else { "" }
                );
            }
        }
        Command::Summary => {
            let summary = client.summary().await?;
            println!("income   {:>12}", summary.total_income.to_string());
            println!("expense  {:>12}", summary.total_expense.to_string());
            println!("balance  {:>12}", summary.balance.to_string());
        }
        Command::Show { id } => {
            print_row(&client.get(id).await?);
        }
        Command::Add {
            amount,
            description,
            category,
            date,
        } => {
            let form = CreateTransaction::from_parts(&parse_amount(&amount)?, description, category, date);
            print_row(&client.create(&form).await?);
        }
        Command::Edit {
            id,
            amount,
            description,
            category,
            date,
        } => {
            let mut form = UpdateTransaction::default();
            if let Some(amount) = amount {
                form = form.with_amount(&parse_amount(&amount)?);
            }
            if let Some(description) = description {
                form = form.with_description(description);
            }
            if let Some(category) = category {
                form = form.with_category(category);
            }
            if let Some(date) = date {
                form = form.with_date(date);
            }
            print_row(&client.update(id, &form).await?);
        }
        Command::Delete { id } => {
            client.delete(id).await?;
        }
        Command::Profile {
            firstname,
            lastname,
            email,
        } => {
            let body = UpsertUser {
                firstname: Some(firstname),
                lastname: Some(lastname),
                email: Some(email),
            };
            let user: User = gateway
                .put("/users/me", &body)
                .await
                .context("saving profile")?;
            println!("{} {} <{}>", user.firstname, user.lastname, user.email);
        }
        Command::IssueToken { .. } => bail!("handled above"),
    }

    Ok(())
}
