//! bookrack - a command-line client for a bookstore catalog API.
//!
//! This application browses and manages a remote book catalog: login and
//! registration, book and genre listings, adding and deleting books, and a
//! cart/transaction purchase flow. Authentication state is persisted between
//! runs so commands pick up where the last session left off.

mod api;
mod auth;
mod cart;
mod config;
mod models;
mod utils;

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{ApiClient, ApiError};
use auth::{AuthError, CredentialStore, FileTokenStore, RegisterOutcome, SessionManager};
use cart::Cart;
use config::Config;
use models::{NewBook, NewOrderItem, NewTransaction, TransactionStatistics};
use utils::{contains_ignore_case, format_date, format_optional, format_price, truncate_string};

// ============================================================================
// Constants
// ============================================================================

/// Maximum concurrent book lookups when resolving transaction line items.
const MAX_CONCURRENT_LOOKUPS: usize = 4;

/// Column width for book titles in list output.
const TITLE_COLUMN_WIDTH: usize = 48;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn usage() {
    eprintln!("bookrack - a command-line client for the bookstore catalog");
    eprintln!();
    eprintln!("Usage: bookrack <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  login [email] [--saved]      Log in (--saved reuses keychain credentials)");
    eprintln!("  register [email]             Create an account");
    eprintln!("  logout                       Log out and forget saved credentials");
    eprintln!("  whoami                       Show the current user");
    eprintln!("  books [--genre <id>] [--search <term>]");
    eprintln!("                               List books, optionally filtered");
    eprintln!("  book <id>                    Show one book");
    eprintln!("  add-book                     Add a book (interactive)");
    eprintln!("  delete-book <id>             Delete a book");
    eprintln!("  genres                       List genres");
    eprintln!("  buy <book-id> [quantity]     Purchase a book directly");
    eprintln!("  cart [show|add|remove|set|clear|checkout] ...");
    eprintln!("                               Manage the local cart");
    eprintln!("  transactions                 List purchases and statistics");
    eprintln!("  transaction <id>             Show one purchase");
    eprintln!("  stats                        Show purchase statistics");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        usage();
        return Ok(());
    };

    let mut config = Config::load().context("Failed to load configuration")?;
    let client = ApiClient::new(&config.resolved_api_url())?;
    let data_dir = config.data_dir()?;
    let store = FileTokenStore::new(&data_dir);
    let mut session = SessionManager::new(client, store);
    info!(api_url = %session.client().base_url(), "bookrack starting");

    // Resolve a persisted token into a profile before running the command.
    // A rejected token clears the session here.
    if command != "logout" {
        if let Err(e) = session.initialize().await {
            warn!(error = %e, "Could not refresh stored session");
        }
    }

    let result = run_command(command, &args[2..], &mut config, &mut session, &data_dir).await;

    // A 401 surfacing from any command means the token went stale mid-run
    if let Err(ref err) = result {
        let unauthorized = matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized))
            || matches!(
                err.downcast_ref::<AuthError>(),
                Some(AuthError::Api(ApiError::Unauthorized))
            );
        if unauthorized {
            session.logout();
            bail!("Session expired - please run `bookrack login` again");
        }
    }

    result
}

async fn run_command(
    command: &str,
    args: &[String],
    config: &mut Config,
    session: &mut SessionManager<FileTokenStore>,
    data_dir: &Path,
) -> Result<()> {
    match command {
        "login" => cmd_login(args, config, session).await,
        "register" => cmd_register(args, session).await,
        "logout" => cmd_logout(config, session),
        "whoami" => cmd_whoami(session),
        "books" => cmd_books(args, session).await,
        "book" => cmd_book(args, session).await,
        "add-book" => cmd_add_book(session).await,
        "delete-book" => cmd_delete_book(args, session).await,
        "genres" => cmd_genres(session).await,
        "buy" => cmd_buy(args, session).await,
        "cart" => cmd_cart(args, session, data_dir).await,
        "transactions" => cmd_transactions(session).await,
        "transaction" => cmd_transaction(args, session).await,
        "stats" => cmd_stats(session).await,
        "help" | "--help" | "-h" => {
            usage();
            Ok(())
        }
        other => {
            usage();
            bail!("Unknown command: {}", other);
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_with_default(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => {
            let input = prompt(&format!("{} [{}]", label, d))?;
            Ok(if input.is_empty() { d.to_string() } else { input })
        }
        None => prompt(label),
    }
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{} (y/N)", question))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// Auth commands
// ============================================================================

async fn cmd_login(
    args: &[String],
    config: &mut Config,
    session: &mut SessionManager<FileTokenStore>,
) -> Result<()> {
    let use_saved = args.iter().any(|a| a == "--saved");
    let email = match args.iter().find(|a| !a.starts_with("--")) {
        Some(email) => email.clone(),
        None => prompt_with_default("Email", config.last_email.as_deref())?,
    };
    if email.is_empty() {
        bail!("An email address is required");
    }

    let password = if use_saved {
        CredentialStore::new(&email)
            .load()
            .context("No saved credentials for this email")?
    } else {
        rpassword::prompt_password("Password: ")?
    };

    let user = session.login(&email, &password).await?;

    config.last_email = Some(email.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    if !use_saved {
        if let Err(e) = CredentialStore::new(&email).save(&password) {
            warn!(error = %e, "Failed to save credentials to keychain");
        }
    }

    println!("Logged in as {}", user.display_name());
    Ok(())
}

async fn cmd_register(
    args: &[String],
    session: &mut SessionManager<FileTokenStore>,
) -> Result<()> {
    let email = match args.first() {
        Some(email) => email.clone(),
        None => prompt("Email")?,
    };
    let password = rpassword::prompt_password("Password: ")?;
    let confirm_password = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm_password {
        bail!("Passwords do not match");
    }

    match session.register(&email, &password).await? {
        RegisterOutcome::LoggedIn(user) => {
            println!("Registered and logged in as {}", user.display_name());
        }
        RegisterOutcome::Registered => {
            println!("Registered - run `bookrack login` to sign in");
        }
    }
    Ok(())
}

fn cmd_logout(config: &Config, session: &mut SessionManager<FileTokenStore>) -> Result<()> {
    session.logout();
    if let Some(ref email) = config.last_email {
        // Forget remember-me credentials too
        let _ = CredentialStore::new(email).forget();
    }
    println!("Logged out");
    Ok(())
}

fn cmd_whoami(session: &SessionManager<FileTokenStore>) -> Result<()> {
    match session.user() {
        Some(user) => {
            println!("Email: {}", user.email);
            println!("Name:  {}", format_optional(&user.name, "-"));
            println!("Id:    {}", format_optional(&user.id, "-"));
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

// ============================================================================
// Catalog commands
// ============================================================================

async fn cmd_books(args: &[String], session: &SessionManager<FileTokenStore>) -> Result<()> {
    let mut genre_id: Option<String> = None;
    let mut search: Option<String> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--genre" => genre_id = Some(iter.next().context("--genre needs a value")?.clone()),
            "--search" => search = Some(iter.next().context("--search needs a value")?.clone()),
            other => bail!("Unknown flag: {}", other),
        }
    }

    let client = session.client();
    let (books, genres) = tokio::try_join!(
        async {
            match &genre_id {
                Some(id) => client.books_by_genre(id, search.as_deref()).await,
                None => client.list_books(search.as_deref()).await,
            }
        },
        client.list_genres(),
    )?;

    let genre_names: HashMap<&str, &str> = genres
        .iter()
        .map(|g| (g.id.as_str(), g.name.as_str()))
        .collect();

    // Client-side fallback filter on top of whatever the server honored
    let displayed: Vec<_> = match &search {
        Some(term) if !term.trim().is_empty() => books
            .iter()
            .filter(|b| contains_ignore_case(&b.title, term.trim()))
            .collect(),
        _ => books.iter().collect(),
    };

    if displayed.is_empty() {
        println!("No books found");
        return Ok(());
    }

    for book in &displayed {
        let genre = book
            .genre_id
            .as_deref()
            .and_then(|id| genre_names.get(id).copied())
            .unwrap_or("-");
        println!(
            "{:<width$} {}",
            truncate_string(&book.title, TITLE_COLUMN_WIDTH),
            book.writer,
            width = TITLE_COLUMN_WIDTH
        );
        println!(
            "    id: {}  genre: {}  price: {}  stock: {}",
            book.id,
            genre,
            book.display_price(),
            book.stock_display()
        );
    }
    println!();
    println!("{} book(s)", displayed.len());
    Ok(())
}

async fn cmd_book(args: &[String], session: &SessionManager<FileTokenStore>) -> Result<()> {
    let id = args.first().context("usage: bookrack book <id>")?;
    let client = session.client();
    let book = client.get_book(id).await?;

    let genre_name = match &book.genre_id {
        Some(genre_id) => match client.get_genre(genre_id).await {
            Ok(genre) => Some(genre.name),
            Err(e) => {
                warn!(error = %e, genre_id = %genre_id, "Failed to fetch genre");
                None
            }
        },
        None => None,
    };

    println!("{}", book.title);
    println!("by {}", book.writer);
    println!();
    if let Some(name) = genre_name {
        println!("Genre:     {}", name);
    }
    if let Some(year) = book.publication_year {
        println!("Year:      {}", year);
    }
    println!("Publisher: {}", format_optional(&book.publisher, "-"));
    if let Some(ref date) = book.publish_date {
        println!("Published: {}", format_date(date));
    }
    println!("Price:     {}", book.display_price());
    println!("Stock:     {}", book.stock_display());
    println!();
    match book.description {
        Some(ref description) if !description.trim().is_empty() => println!("{}", description),
        _ => println!("No description available."),
    }
    Ok(())
}

async fn cmd_add_book(session: &SessionManager<FileTokenStore>) -> Result<()> {
    let client = session.client();

    // Offer the genre list before prompting so ids can be copied in
    let genres = client.list_genres().await.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to fetch genres");
        Vec::new()
    });
    if !genres.is_empty() {
        println!("Genres:");
        for genre in &genres {
            println!("  {}  {}", genre.id, genre.name);
        }
        println!();
    }

    let title = prompt("Title")?;
    let writer = prompt("Author")?;
    let publisher = prompt("Publisher")?;
    let publication_year: i32 = prompt("Publication year")?
        .parse()
        .context("Publication year must be a number")?;
    let price: f64 = prompt("Price")?.parse().context("Price must be a number")?;
    let stock_quantity: i64 = prompt("Stock quantity")?
        .parse()
        .context("Stock quantity must be a number")?;
    let genre_id = {
        let input = prompt("Genre id (optional)")?;
        if input.is_empty() { None } else { Some(input) }
    };

    let book = NewBook {
        title,
        writer,
        publisher,
        publication_year,
        price,
        stock_quantity,
        genre_id,
    };
    if let Err(field) = book.validate() {
        bail!("All required fields must be filled ({} is missing or invalid)", field);
    }

    let id = client.create_book(&book).await?;
    println!("Book added: {}", id);
    Ok(())
}

async fn cmd_delete_book(args: &[String], session: &SessionManager<FileTokenStore>) -> Result<()> {
    let id = args.first().context("usage: bookrack delete-book <id>")?;
    if !confirm("Are you sure you want to delete this book?")? {
        println!("Cancelled");
        return Ok(());
    }
    session.client().delete_book(id).await?;
    println!("Book deleted");
    Ok(())
}

async fn cmd_genres(session: &SessionManager<FileTokenStore>) -> Result<()> {
    let genres = session.client().list_genres().await?;
    if genres.is_empty() {
        println!("No genres found");
        return Ok(());
    }
    for genre in &genres {
        println!("{}  {}", genre.id, genre.name);
    }
    Ok(())
}

// ============================================================================
// Purchase commands
// ============================================================================

async fn cmd_buy(args: &[String], session: &SessionManager<FileTokenStore>) -> Result<()> {
    let book_id = args.first().context("usage: bookrack buy <book-id> [quantity]")?;
    let quantity: i64 = match args.get(1) {
        Some(raw) => raw.parse().context("Quantity must be a number")?,
        None => 1,
    };
    if quantity < 1 {
        bail!("Quantity must be at least 1");
    }

    let user = session
        .user()
        .context("Please login first to make a purchase")?;
    let user_id = user
        .id
        .clone()
        .context("User information not available - please login again")?;

    let client = session.client();
    let book = client.get_book(book_id).await?;
    if quantity > book.stock_quantity {
        bail!("Insufficient stock ({} available)", book.stock_quantity);
    }

    let tx = NewTransaction {
        user_id,
        items: vec![NewOrderItem {
            book_id: book.id.clone(),
            quantity,
        }],
    };
    let id = client.create_transaction(&tx).await?;

    println!(
        "Purchase successful: {} x {} for {}",
        quantity,
        book.title,
        format_price(book.price * quantity as f64)
    );
    println!("Transaction: {}", id);
    Ok(())
}

async fn cmd_cart(
    args: &[String],
    session: &SessionManager<FileTokenStore>,
    data_dir: &Path,
) -> Result<()> {
    let mut cart = Cart::load(data_dir)?;
    let subcommand = args.first().map(String::as_str).unwrap_or("show");

    match subcommand {
        "show" => {
            if cart.is_empty() {
                println!("Cart is empty");
                return Ok(());
            }
            for item in cart.items() {
                println!(
                    "{:<width$} x{:<4} {}",
                    truncate_string(&item.title, TITLE_COLUMN_WIDTH),
                    item.quantity,
                    format_price(item.subtotal()),
                    width = TITLE_COLUMN_WIDTH
                );
            }
            println!();
            println!("Total: {}", cart.display_total());
        }
        "add" => {
            let book_id = args.get(1).context("usage: bookrack cart add <book-id> [quantity]")?;
            let quantity: i64 = match args.get(2) {
                Some(raw) => raw.parse().context("Quantity must be a number")?,
                None => 1,
            };
            let book = session.client().get_book(book_id).await?;
            if quantity > book.stock_quantity {
                bail!("Insufficient stock ({} available)", book.stock_quantity);
            }
            cart.add(&book, quantity);
            cart.save()?;
            println!("Added {} x {}", quantity.max(1), book.title);
        }
        "remove" => {
            let book_id = args.get(1).context("usage: bookrack cart remove <book-id>")?;
            if cart.remove(book_id) {
                cart.save()?;
                println!("Removed {}", book_id);
            } else {
                println!("Not in cart: {}", book_id);
            }
        }
        "set" => {
            let book_id = args.get(1).context("usage: bookrack cart set <book-id> <quantity>")?;
            let quantity: i64 = args
                .get(2)
                .context("usage: bookrack cart set <book-id> <quantity>")?
                .parse()
                .context("Quantity must be a number")?;
            if cart.update_quantity(book_id, quantity) {
                cart.save()?;
                if quantity <= 0 {
                    println!("Removed {}", book_id);
                } else {
                    println!("Set {} to x{}", book_id, quantity);
                }
            } else {
                println!("Not in cart: {}", book_id);
            }
        }
        "clear" => {
            cart.clear();
            cart.save()?;
            println!("Cart cleared");
        }
        "checkout" => {
            if cart.is_empty() {
                bail!("Cart is empty");
            }
            let user = session
                .user()
                .context("Please login first to make a purchase")?;
            let user_id = user
                .id
                .clone()
                .context("User information not available - please login again")?;

            let tx = NewTransaction {
                user_id,
                items: cart.to_order_items(),
            };
            let id = session.client().create_transaction(&tx).await?;

            println!("Purchase successful: {}", cart.display_total());
            println!("Transaction: {}", id);

            // Only an accepted purchase empties the cart
            cart.clear();
            cart.save()?;
        }
        other => bail!("Unknown cart subcommand: {}", other),
    }
    Ok(())
}

async fn cmd_transactions(session: &SessionManager<FileTokenStore>) -> Result<()> {
    let client = session.client();
    let (transactions, stats) =
        tokio::try_join!(client.list_transactions(), client.transaction_statistics())?;

    print_statistics(&stats);
    println!();

    if transactions.is_empty() {
        println!("No transactions yet");
        return Ok(());
    }
    for tx in &transactions {
        let date = tx.created_at.as_deref().map(format_date).unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  {:>2} item(s)  {}",
            tx.id,
            date,
            tx.item_count(),
            tx.display_total()
        );
    }
    Ok(())
}

async fn cmd_transaction(args: &[String], session: &SessionManager<FileTokenStore>) -> Result<()> {
    let id = args.first().context("usage: bookrack transaction <id>")?;
    let client = session.client();
    let tx = client.get_transaction(id).await?;

    // One backend variant omits titles from line items; resolve them with a
    // bounded fan-out over the catalog.
    let missing: Vec<String> = tx
        .order_items
        .iter()
        .filter(|item| item.book_title.is_none())
        .map(|item| item.book_id.clone())
        .collect();
    let titles: HashMap<String, String> = stream::iter(missing)
        .map(|book_id| {
            let client = client.clone();
            async move {
                let title = client.get_book(&book_id).await.ok().map(|b| b.title);
                (book_id, title)
            }
        })
        .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
        .filter_map(|(book_id, title)| async move { title.map(|t| (book_id, t)) })
        .collect()
        .await;

    println!("Transaction {}", tx.id);
    if let Some(ref date) = tx.created_at {
        println!("Date: {}", format_date(date));
    }
    println!();
    for item in &tx.order_items {
        let title = item
            .book_title
            .as_deref()
            .or_else(|| titles.get(&item.book_id).map(String::as_str))
            .unwrap_or(item.book_id.as_str());
        println!(
            "{:<width$} x{:<4} {}",
            truncate_string(title, TITLE_COLUMN_WIDTH),
            item.quantity,
            format_price(item.subtotal()),
            width = TITLE_COLUMN_WIDTH
        );
    }
    println!();
    println!("Total: {}", tx.display_total());
    Ok(())
}

async fn cmd_stats(session: &SessionManager<FileTokenStore>) -> Result<()> {
    let stats = session.client().transaction_statistics().await?;
    print_statistics(&stats);
    Ok(())
}

fn print_statistics(stats: &TransactionStatistics) {
    if let Some(n) = stats.total_transactions {
        println!("Transactions:        {}", n);
    }
    if let Some(v) = stats.total_revenue {
        println!("Revenue:             {}", format_price(v));
    }
    if let Some(n) = stats.total_books_sold {
        println!("Books sold:          {}", n);
    }
    if let Some(v) = stats.average_transaction_value {
        println!("Average transaction: {}", format_price(v));
    }
    if let Some(ref genre) = stats.most_genre {
        println!("Most popular genre:  {}", genre);
    }
    if let Some(ref genre) = stats.least_genre {
        println!("Least popular genre: {}", genre);
    }
}
