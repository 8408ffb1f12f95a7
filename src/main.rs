//! shelf: personal e-book library from the command line.
//!
//! Every command prints its result as pretty JSON on stdout; logs go to
//! stderr (`RUST_LOG` overrides the default `info` level).

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use shelf::library::{BookFields, BookFilter, BookUpdate, NoteInput, UploadRequest, UploadedFile};
use shelf::models::{ReadingStatus, User};
use shelf::seed::seed_categories;
use shelf::{Library, LibraryConfig, LibraryError};

#[derive(Parser)]
#[command(name = "shelf", version, about = "Personal e-book library")]
struct Cli {
  /// Data directory holding the database, documents and covers.
  #[arg(long, global = true, env = "SHELF_DATA_DIR")]
  data_dir: Option<PathBuf>,

  /// TOML config file.
  #[arg(long, global = true, env = "SHELF_CONFIG")]
  config: Option<PathBuf>,

  /// Email of the acting user.
  #[arg(long, global = true, env = "SHELF_USER")]
  user: Option<String>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create the data directory, database and stock categories.
  Init,

  /// Manage users.
  User {
    #[command(subcommand)]
    action: UserAction,
  },

  /// Upload, browse and edit books.
  Books {
    #[command(subcommand)]
    action: BookAction,
  },

  /// Notes on books.
  Notes {
    #[command(subcommand)]
    action: NoteAction,
  },

  /// Tags used on the acting user's notes.
  Tags,

  Authors {
    #[command(subcommand)]
    action: AuthorAction,
  },

  Categories {
    #[command(subcommand)]
    action: CategoryAction,
  },

  /// Book and note counts for the acting user.
  Dashboard,
}

#[derive(Subcommand)]
enum UserAction {
  Add {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
  },
}

#[derive(Subcommand)]
enum BookAction {
  List {
    #[arg(long)]
    category: Option<i64>,
    #[arg(long)]
    status: Option<ReadingStatus>,
    /// Substring of the title or author name.
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    page: Option<u32>,
  },
  Show {
    id: i64,
  },
  /// Upload a pdf, epub or mobi file.
  Upload {
    file: PathBuf,
    #[command(flatten)]
    fields: FieldArgs,
    /// Explicit cover image; skips cover generation.
    #[arg(long)]
    cover: Option<PathBuf>,
  },
  Update {
    id: i64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    status: Option<ReadingStatus>,
    /// Reading progress in percent.
    #[arg(long)]
    progress: Option<f64>,
    #[arg(long)]
    rating: Option<u8>,
    #[arg(long)]
    pages: Option<u32>,
    #[arg(long)]
    author_id: Option<i64>,
    #[arg(long)]
    category_id: Option<i64>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    publish_date: Option<NaiveDate>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    cover: Option<PathBuf>,
  },
  /// Replace the cover with an image file.
  Cover {
    id: i64,
    image: PathBuf,
  },
  Delete {
    id: i64,
  },
  /// Print the on-disk path of the book's document.
  Path {
    id: i64,
  },
}

#[derive(Args)]
struct FieldArgs {
  /// Defaults to the file name without extension.
  #[arg(long)]
  title: Option<String>,
  #[arg(long)]
  author_id: Option<i64>,
  #[arg(long)]
  category_id: Option<i64>,
  #[arg(long)]
  isbn: Option<String>,
  #[arg(long)]
  publisher: Option<String>,
  /// YYYY-MM-DD
  #[arg(long)]
  publish_date: Option<NaiveDate>,
  #[arg(long)]
  description: Option<String>,
  #[arg(long)]
  rating: Option<u8>,
}

#[derive(Subcommand)]
enum NoteAction {
  Add {
    book_id: i64,
    #[arg(long)]
    content: String,
    #[arg(long)]
    page: Option<String>,
    #[arg(long = "tag")]
    tags: Vec<String>,
  },
  Update {
    id: i64,
    #[arg(long)]
    content: String,
    #[arg(long)]
    page: Option<String>,
    /// Replaces the note's tags when given.
    #[arg(long = "tag")]
    tags: Vec<String>,
    #[arg(long, conflicts_with = "tags")]
    clear_tags: bool,
  },
  Delete {
    id: i64,
  },
}

#[derive(Subcommand)]
enum AuthorAction {
  List,
  Add {
    name: String,
    #[arg(long)]
    bio: Option<String>,
  },
}

#[derive(Subcommand)]
enum CategoryAction {
  List,
  Add {
    name: String,
    #[arg(long)]
    description: Option<String>,
    /// Badge color as #rrggbb.
    #[arg(long)]
    color: Option<String>,
  },
}

#[derive(Debug, Error)]
enum CliError {
  #[error(transparent)]
  Library(#[from] LibraryError),

  #[error("cannot encode output: {0}")]
  Json(#[from] serde_json::Error),

  #[error("no acting user; pass --user or set SHELF_USER")]
  NoUser,

  #[error("unknown user {0}")]
  UnknownUser(String),
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {}", err);
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<(), CliError> {
  let mut config = match &cli.config {
    Some(path) => LibraryConfig::load(path)?,
    None => LibraryConfig::default(),
  };
  if let Some(data_dir) = &cli.data_dir {
    config.data_dir = data_dir.clone();
  }
  let mut library = Library::open(&config)?;

  match cli.command {
    Commands::Init => {
      let added = seed_categories(library.connection_mut())?;
      print_json(&serde_json::json!({
        "dataDir": config.data_dir,
        "categoriesAdded": added,
      }))
    }

    Commands::User { action } => match action {
      UserAction::Add { name, email } => print_json(&library.create_user(&name, &email)?),
    },

    Commands::Books { action } => {
      let user = acting_user(&library, cli.user.as_deref())?;
      run_books(&mut library, &user, action)
    }

    Commands::Notes { action } => {
      let user = acting_user(&library, cli.user.as_deref())?;
      match action {
        NoteAction::Add {
          book_id,
          content,
          page,
          tags,
        } => print_json(&library.create_note(
          &user,
          book_id,
          NoteInput {
            content,
            page_number: page,
            tags: Some(tags),
          },
        )?),
        NoteAction::Update {
          id,
          content,
          page,
          tags,
          clear_tags,
        } => {
          let tags = if clear_tags {
            Some(Vec::new())
          } else if tags.is_empty() {
            None
          } else {
            Some(tags)
          };
          print_json(&library.update_note(
            &user,
            id,
            NoteInput {
              content,
              page_number: page,
              tags,
            },
          )?)
        }
        NoteAction::Delete { id } => {
          library.delete_note(&user, id)?;
          print_json(&serde_json::json!({ "deleted": id }))
        }
      }
    }

    Commands::Tags => {
      let user = acting_user(&library, cli.user.as_deref())?;
      print_json(&library.list_tags(&user)?)
    }

    Commands::Authors { action } => match action {
      AuthorAction::List => print_json(&library.list_authors()?),
      AuthorAction::Add { name, bio } => {
        print_json(&library.create_author(&name, bio.as_deref())?)
      }
    },

    Commands::Categories { action } => match action {
      CategoryAction::List => print_json(&library.list_categories()?),
      CategoryAction::Add {
        name,
        description,
        color,
      } => print_json(&library.create_category(
        &name,
        description.as_deref(),
        color.as_deref(),
      )?),
    },

    Commands::Dashboard => {
      let user = acting_user(&library, cli.user.as_deref())?;
      print_json(&library.dashboard(&user)?)
    }
  }
}

fn run_books(library: &mut Library, user: &User, action: BookAction) -> Result<(), CliError> {
  match action {
    BookAction::List {
      category,
      status,
      search,
      page,
    } => print_json(&library.list_books(
      user,
      &BookFilter {
        category_id: category,
        status,
        search,
        page,
      },
    )?),
    BookAction::Show { id } => print_json(&library.show_book(user, id)?),
    BookAction::Upload {
      file,
      fields,
      cover,
    } => {
      let title = fields.title.unwrap_or_else(|| {
        file.file_stem()
          .map(|stem| stem.to_string_lossy().to_string())
          .unwrap_or_default()
      });
      let request = UploadRequest {
        fields: BookFields {
          title,
          author_id: fields.author_id,
          category_id: fields.category_id,
          isbn: fields.isbn,
          publisher: fields.publisher,
          publish_date: fields.publish_date,
          description: fields.description,
          rating: fields.rating,
        },
        file: UploadedFile::new(file),
        cover_image: cover.map(UploadedFile::new),
      };
      print_json(&library.upload_book(user, request)?)
    }
    BookAction::Update {
      id,
      title,
      status,
      progress,
      rating,
      pages,
      author_id,
      category_id,
      isbn,
      publisher,
      publish_date,
      description,
      cover,
    } => {
      let update = BookUpdate {
        title,
        author_id: author_id.map(Some),
        category_id: category_id.map(Some),
        isbn: isbn.map(Some),
        publisher: publisher.map(Some),
        publish_date: publish_date.map(Some),
        description: description.map(Some),
        rating: rating.map(Some),
        pages: pages.map(Some),
        status,
        reading_progress: progress,
        cover_image: cover.map(UploadedFile::new),
      };
      print_json(&library.update_book(user, id, update)?)
    }
    BookAction::Cover { id, image } => {
      print_json(&library.replace_cover(user, id, UploadedFile::new(image))?)
    }
    BookAction::Delete { id } => {
      library.delete_book(user, id)?;
      print_json(&serde_json::json!({ "deleted": id }))
    }
    BookAction::Path { id } => {
      let path = library.book_file(user, id)?;
      println!("{}", path.display());
      Ok(())
    }
  }
}

fn acting_user(library: &Library, email: Option<&str>) -> Result<User, CliError> {
  let email = email.ok_or(CliError::NoUser)?;
  library
    .find_user_by_email(email)?
    .ok_or_else(|| CliError::UnknownUser(email.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
