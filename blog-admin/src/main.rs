use anyhow::{bail, Context, Result};
use blog_server::application::auth_service::hash_password;
use blog_server::application::{BlogService, PersistReport, PostFilter, Stores, SyncService};
use blog_server::data::{JsonFileStore, PostCache, PrimaryStore, StoreWrite};
use blog_server::domain::{CreatePostRequest, Post};
use blog_server::infrastructure::config::{data_file_from_env, DatabaseConfig};
use blog_server::infrastructure::database::{connect_primary_store, create_pool, run_migrations};
use blog_server::infrastructure::logging::init_cli_logging;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON data file (defaults to DATA_FILE or data/posts.json)
    #[arg(long)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Replace every post in the database with the posts of a JSON file
    Seed {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Reconcile the data file with the database
    Sync,

    List {
        /// Include hidden posts
        #[arg(short, long)]
        all: bool,
    },

    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long, default_value = "")]
        content: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, default_value = "")]
        tags: String,
    },

    /// Show or hide a post
    Toggle {
        #[arg(short, long)]
        id: i64,
    },

    Delete {
        #[arg(short, long)]
        id: i64,
    },

    /// Print an argon2 hash for ADMIN_PASSWORD_HASH
    HashPassword { password: String },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_cli_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "❌".red(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let data_file = cli.data_file.unwrap_or_else(data_file_from_env);

    match cli.command {
        Commands::Migrate => {
            let config = database_config()?;
            let pool = create_pool(&config)?;
            run_migrations(&pool)
                .await
                .context("Failed to apply migrations")?;
            println!("{}", "✅ Migrations applied".green());
        }

        Commands::Seed { file } => {
            let posts = JsonFileStore::new(&file)
                .try_read_all()
                .await
                .with_context(|| format!("Failed to read {:?}", file))?
                .with_context(|| format!("{:?} does not exist", file))?;

            let config = database_config()?;
            let primary = PrimaryStore::from_pool(Some(create_pool(&config)?));
            seed(&primary, posts).await?;
        }

        Commands::Sync => {
            let stores = open_stores(data_file).await;
            let report = SyncService::new(stores).sync().await;

            if report.store_available {
                println!("{}", "✅ Synchronization complete".green());
            } else {
                println!("{}", "⚠️  Database unreachable, data file only".yellow());
            }
            println!("   Updated from database: {}", report.updated);
            println!("   Added from database:   {}", report.added);
            println!("   Created in database:   {}", report.created_in_store);
            println!("   Comments pushed:       {}", report.comments_pushed);
            println!("   Posts in cache:        {}", report.total_cache);
            println!("   Posts in database:     {}", report.total_store);
        }

        Commands::List { all } => {
            let stores = open_stores(data_file).await;
            SyncService::new(stores.clone()).load_posts().await;
            let blog = BlogService::new(stores);

            let posts = if all {
                blog.get_all().await
            } else {
                blog.list_public(&PostFilter::default()).await
            };

            println!("📋 {} posts", posts.len());
            if posts.is_empty() {
                println!("   Tip: blog-admin create --title \"My Post\"");
            }
            for post in &posts {
                print_post(post);
            }
        }

        Commands::Create {
            title,
            content,
            category,
            tags,
        } => {
            let blog = loaded_blog(data_file).await;
            let created = blog
                .create(CreatePostRequest {
                    title,
                    content,
                    category,
                    tags,
                    ..CreatePostRequest::default()
                })
                .await?;

            println!("{}", "✅ Post created".green());
            print_post(&created.value);
            print_persistence(&created.persistence);
        }

        Commands::Toggle { id } => {
            let blog = loaded_blog(data_file).await;
            let toggled = blog.toggle_active(id).await?;

            let state = if toggled.value { "visible" } else { "hidden" };
            println!("{} Post #{} is now {}", "✅".green(), id, state);
            print_persistence(&toggled.persistence);
        }

        Commands::Delete { id } => {
            let blog = loaded_blog(data_file).await;
            let deleted = blog.delete(id).await?;

            println!("{} Deleted post #{}: {}", "🗑️".red(), id, deleted.value.title);
            print_persistence(&deleted.persistence);
        }

        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
    }

    Ok(())
}

fn database_config() -> Result<DatabaseConfig> {
    match DatabaseConfig::from_env()? {
        Some(config) => Ok(config),
        None => bail!("DATABASE_URL must be set for this command"),
    }
}

async fn open_stores(data_file: PathBuf) -> Stores {
    let database = DatabaseConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Ignoring database settings: {}", e);
        None
    });
    Stores::new(
        PostCache::new(),
        connect_primary_store(database.as_ref(), false).await,
        JsonFileStore::new(data_file),
    )
}

async fn loaded_blog(data_file: PathBuf) -> BlogService {
    let stores = open_stores(data_file).await;
    SyncService::new(stores.clone()).load_posts().await;
    BlogService::new(stores)
}

async fn seed(primary: &PrimaryStore, posts: Vec<Post>) -> Result<()> {
    println!("🌱 Seeding {} posts...", posts.len());

    primary
        .execute("clear_all", |db| async move { db.clear_all().await })
        .await
        .context("Failed to clear database")?;

    for post in posts {
        let (id, title) = (post.id, post.title.clone());
        primary
            .execute("upsert_post", |db| async move { db.upsert_post(&post).await })
            .await
            .with_context(|| format!("Failed to insert post #{}", id))?;
        println!("   {} [{}] {}", "✓".green(), id, title);
    }

    println!("{}", "✅ Seeding complete".green());
    Ok(())
}

fn print_post(post: &Post) {
    let status = if post.active {
        "active".green()
    } else {
        "hidden".yellow()
    };
    println!("   [{}] {} ({})", post.id, post.title.bold(), status);
    println!(
        "      /{}  {}  views: {}  likes: {}  comments: {}",
        post.url_id,
        post.date.format("%Y-%m-%d"),
        post.views,
        post.likes,
        post.comments.len()
    );
}

fn print_persistence(report: &PersistReport) {
    for (name, write) in [("database", &report.primary), ("data file", &report.secondary)] {
        match write {
            StoreWrite::Written => println!("   {} saved to {}", "✓".green(), name),
            StoreWrite::Skipped => println!("   {} {} already up to date", "✓".green(), name),
            StoreWrite::Unavailable => {
                println!("   {} {} unavailable, run sync later", "!".yellow(), name)
            }
            StoreWrite::Failed(reason) => {
                println!("   {} {} write failed: {}", "✗".red(), name, reason)
            }
        }
    }
}
