use clap::{Parser, Subcommand};
use itertools::Itertools;
use tagbox::{decode, Basename, Ext, Name, Tag};

#[derive(Parser)]
#[command(author, version, about = "Inspect and build element basenames", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the name, tags, extension, and type of each basename
    ///
    /// Tags are marked with `#`,
    /// with `_` standing in for spaces,
    /// and may appear anywhere before the extension.
    Decode {
        #[arg(required = true, value_name = "BASENAME", value_parser = basename_parser)]
        basenames: Vec<Basename>,
    },
    /// Print the canonical basename for a name, tags, and extension
    ///
    /// Tags are sorted and repeats dropped.
    Encode {
        /// Name, normalized before encoding
        #[arg(long, short, default_value = "")]
        name: Name,

        /// Tag to include
        #[arg(long = "tag", short, value_name = "TAG", value_parser = tag_parser)]
        tags: Vec<Tag>,

        #[arg(long, short, value_parser = ext_parser)]
        ext: Ext,
    },
}

fn basename_parser(s: &str) -> Result<Basename, String> {
    decode(s).map_err(|e| e.to_string())
}

fn tag_parser(s: &str) -> Result<Tag, String> {
    Tag::new(s.to_owned()).map_err(|e| e.to_string())
}

fn ext_parser(s: &str) -> Result<Ext, String> {
    Ext::new(s).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Commands::Decode { basenames } => {
            for basename in basenames {
                println!("{basename}");
                println!("  name: {}", basename.name());
                println!("  tags: {}", basename.tags().format(", "));
                println!("  ext:  {}", basename.ext());
                println!("  type: {}", basename.ty());
            }
        }
        Commands::Encode { name, tags, ext } => {
            println!("{}", Basename::new(name, tags.into_iter().collect(), ext)?);
        }
    }
    Ok(())
}
