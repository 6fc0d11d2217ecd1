use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use imagecluster_core::clustering::ClusterMethod;
use imagecluster_core::logging::init_logger;
use imagecluster_core::processing::{PcaComponents, PcaParams};
use imagecluster_core::{Config, ImageSize, Pipeline};

#[derive(Parser)]
#[command(name = "imagecluster")]
#[command(about = "Cluster a directory of images by visual similarity")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hierarchical clustering at a similarity threshold
    Hierarchy {
        #[command(flatten)]
        common: CommonArgs,

        /// Similarity in [0, 1]; higher means fewer, tighter clusters
        #[arg(long, default_value_t = 0.5)]
        sim: f64,

        /// Also render the clusters into one PNG at this path
        #[arg(long)]
        mosaic: Option<PathBuf>,

        /// Leave clusters with more members out of the mosaic
        #[arg(long)]
        max_csize: Option<usize>,
    },

    /// K-means clustering into a fixed number of clusters
    Kmeans {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of clusters
        #[arg(long)]
        n_clusters: usize,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "imagecluster.json")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Directory holding the images
    imagedir: PathBuf,

    /// Don't create the directory of links per cluster
    #[arg(long)]
    no_links: bool,

    /// Run PCA first: a component count (e.g. 50) or a variance fraction (e.g. 0.9)
    #[arg(long)]
    pca: Option<PcaComponents>,

    /// Feature layer (gray8, gray16, gray32, rgb8)
    #[arg(long)]
    layer: Option<String>,

    /// Image size before feature extraction, e.g. 224 or 224x160
    #[arg(long)]
    size: Option<ImageSize>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl CommonArgs {
    /// Load the configuration and apply command line overrides
    fn config(&self) -> Result<Config, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if self.no_links {
            config.links = false;
        }
        if let Some(n_components) = self.pca {
            config.pca = Some(PcaParams { n_components });
        }
        if let Some(layer) = &self.layer {
            config.layer = layer.clone();
        }
        if let Some(size) = self.size {
            config.image_size = size;
        }

        config.validate()?;
        Ok(config)
    }

    fn init_logging(&self, name: &str, config: &Config) -> Result<(), anyhow::Error> {
        match &self.log_dir {
            Some(dir) => {
                init_logger(dir, name, false, config.log_level.into())
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
            }
            None => env_logger::Builder::new()
                .filter_level(config.log_level.into())
                .parse_env("IMAGECLUSTER_LOG")
                .init(),
        }
        Ok(())
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Hierarchy {
            common,
            sim,
            mosaic,
            max_csize,
        } => {
            let mut config = common.config()?;
            if max_csize.is_some() {
                config.max_csize = max_csize;
            }
            common.init_logging("hierarchy", &config)?;

            let pipeline = Pipeline::new(config)?;
            let run = pipeline.run(&common.imagedir, ClusterMethod::Hierarchical { similarity: sim })?;
            report(&pipeline, &common.imagedir, run.grouping.len());

            if let Some(path) = mosaic {
                let canvas = pipeline.mosaic(&common.imagedir, &run.grouping)?;
                let img = canvas
                    .to_rgb_image()
                    .ok_or_else(|| anyhow::anyhow!("mosaic buffer does not match its size"))?;
                img.save(&path)?;
                info!("Mosaic saved to {}", path.display());
            }

            Ok(())
        }

        Commands::Kmeans { common, n_clusters } => {
            let config = common.config()?;
            common.init_logging("kmeans", &config)?;

            let pipeline = Pipeline::new(config)?;
            let run = pipeline.run(&common.imagedir, ClusterMethod::Partition { k: n_clusters })?;
            report(&pipeline, &common.imagedir, run.grouping.len());

            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}

fn report(pipeline: &Pipeline, imagedir: &Path, clusters: usize) {
    if pipeline.config().links {
        info!(
            "{} clusters linked under {}",
            clusters,
            pipeline.links_dir(imagedir).display()
        );
    } else {
        info!("{} clusters found", clusters);
    }
}
