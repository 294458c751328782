use std::{path::PathBuf, time::UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use itertools::Itertools;
use tagbox::{
    encoding::{collection_path, encode_str}, BatchReport, Element, Library, OsFilesystem, Tag, TagRequest,
    UpdateElementRequest,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Manage collections of tagged elements", long_about = None)]
struct Args {
    /// Directory holding the collections
    #[arg(long, env = "TAGBOX_ROOT", default_value = ".")]
    root: PathBuf,

    /// Number of threads used to rename elements
    #[arg(long, short, env = "TAGBOX_JOBS")]
    jobs: Option<usize>,

    /// Log more, repeat for even more
    ///
    /// `RUST_LOG` takes precedence when set.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the tags of a collection
    #[command(subcommand)]
    Tags(TagsCommand),
    /// Manage the elements of a collection
    #[command(subcommand)]
    Elements(ElementsCommand),
}

#[derive(Subcommand)]
enum TagsCommand {
    /// Print tags in registry order
    List {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
    },
    /// Register a new tag
    Create {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        name: String,
    },
    /// Rename a tag on every element carrying it
    Rename {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        #[arg(value_parser = tag_parser)]
        old: Tag,
        new: String,
    },
    /// Remove a tag from every element and the registry
    Delete {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        #[arg(value_parser = tag_parser)]
        name: Tag,
    },
}

#[derive(Subcommand)]
enum ElementsCommand {
    /// Print elements,
    /// optionally filtered by tags
    List {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,

        /// Only elements with this tag
        #[arg(long, short, value_name = "TAG", value_parser = tag_parser)]
        include: Vec<Tag>,

        /// Only elements without this tag
        #[arg(long, short, value_name = "TAG", value_parser = tag_parser)]
        exclude: Vec<Tag>,
    },
    /// Print an element and,
    /// for text types,
    /// its content
    Show {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        basename: String,
    },
    /// Replace the name and tags of an element
    ///
    /// Every tag must already be registered.
    Retag {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        basename: String,

        /// New name, empty for a tags-only element
        #[arg(long, short, default_value = "")]
        name: String,

        /// Tag to give the element
        #[arg(long = "tag", short, value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Delete an element
    Rm {
        #[arg(value_parser = collection_parser)]
        collection: PathBuf,
        basename: String,
    },
}

/// Collections are relative to `--root`
/// and may not leave it.
fn collection_parser(s: &str) -> Result<PathBuf, String> {
    collection_path(s).map_err(|e| e.to_string())
}

fn tag_parser(s: &str) -> Result<Tag, String> {
    Tag::new(s.to_owned()).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to start rename threads")?;
    }

    let library = Library::new(OsFilesystem::new(args.root));
    match args.command {
        Commands::Tags(command) => tags(&library, command),
        Commands::Elements(command) => elements(&library, command),
    }
}

fn tags(library: &Library<OsFilesystem>, command: TagsCommand) -> anyhow::Result<()> {
    let tags = library.tags();
    match command {
        TagsCommand::List { collection } => {
            for tag in tags.get_all(&collection)? {
                println!("{tag}");
            }
        }
        TagsCommand::Create { collection, name } => {
            println!("{}", tags.create(&collection, &TagRequest::new(name))?);
        }
        TagsCommand::Rename { collection, old, new } => {
            let update = tags.update(
                &collection,
                &encode_str(old.as_str()),
                &TagRequest::new(new),
            )?;
            report_batch(&update.report)?;
            println!("{}", update.tag);
        }
        TagsCommand::Delete { collection, name } => {
            report_batch(&tags.delete(&collection, &encode_str(name.as_str()))?)?;
        }
    }
    Ok(())
}

fn elements(library: &Library<OsFilesystem>, command: ElementsCommand) -> anyhow::Result<()> {
    let elements = library.elements();
    match command {
        ElementsCommand::List {
            collection,
            include,
            exclude,
        } => {
            for element in elements.find(&collection, &include, &exclude)? {
                println!("{}", summary(&element));
            }
        }
        ElementsCommand::Show {
            collection,
            basename,
        } => {
            let element = elements.get(&collection, &basename)?;
            println!("{}", summary(&element));
            println!("name: {}", element.name());
            println!("tags: {}", element.tags().format(", "));
            if let Ok(modified) = element.last_modified().duration_since(UNIX_EPOCH) {
                println!("modified: {}", modified.as_secs());
            }
            if let Some(content) = elements.content(&collection, &basename)? {
                println!();
                print!("{content}");
            }
        }
        ElementsCommand::Retag {
            collection,
            basename,
            name,
            tags,
        } => {
            let element =
                elements.update(&collection, &basename, &UpdateElementRequest { name, tags })?;
            println!("{}", element.basename());
        }
        ElementsCommand::Rm {
            collection,
            basename,
        } => elements.delete(&collection, &basename)?,
    }
    Ok(())
}

fn summary(element: &Element) -> String {
    format!(
        "{}\t{}\t{}",
        element.basename(),
        element.ty(),
        element.size()
    )
}

fn report_batch(report: &BatchReport) -> anyhow::Result<()> {
    for rename in &report.renamed {
        println!("{} -> {}", rename.from, rename.to);
    }
    if report.is_complete() {
        Ok(())
    } else {
        for failure in &report.failed {
            eprintln!("{failure}");
        }
        bail!("{} elements could not be renamed", report.failed.len())
    }
}
