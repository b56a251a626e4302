use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;

use skymap::catalog::{ProjectedPoint, SkyPoint, project_all};
use skymap::config::ViewConfig;
use skymap::credible::HealpixMap;
use skymap::export::write_csv;
use skymap::geom::Frame;
use skymap::{healpix, ingest};
use skymap::selection::{Mode, ViewEvent, ViewState};

#[derive(Parser)]
#[command(name = "skymap", about = "Sky map projection and region selection")]
struct Cli {
    /// JSON file overriding view defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project catalog points to screen coordinates.
    Project {
        #[command(flatten)]
        view: ViewArgs,

        /// Write CSV here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Select points inside a screen-space lasso or polygon.
    Select {
        #[command(flatten)]
        view: ViewArgs,

        /// Vertices as "x,y x,y ..." in canvas pixels.
        #[arg(long, required_unless_present = "search")]
        vertices: Option<String>,

        /// Close the path as a polygon instead of a lasso.
        #[arg(long)]
        polygon: bool,

        /// Select the first point whose id contains this text.
        #[arg(long, conflicts_with = "vertices")]
        search: Option<String>,

        /// Write CSV here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report the credible region of a HEALPix probability map.
    Credible {
        /// Dense RING array (JSON or whitespace separated) or structured map.
        map: PathBuf,

        /// Credible level in [0, 1].
        #[arg(short, long, default_value = "0.9")]
        level: f64,

        /// Write region pixels as CSV here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Select catalog points inside a posterior credible region.
    Posterior {
        #[command(flatten)]
        view: ViewArgs,

        /// HEALPix probability map.
        #[arg(long, conflicts_with = "samples", required_unless_present = "samples")]
        map: Option<PathBuf>,

        /// Posterior samples, one "ra dec" pair per line.
        #[arg(long)]
        samples: Option<PathBuf>,

        /// Credible level in [0, 1] (config default if omitted).
        #[arg(short, long)]
        level: Option<f64>,

        /// Write CSV here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ViewArgs {
    /// Galaxy catalog text file.
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Pulsar JSON file.
    #[arg(long)]
    pulsars: Option<PathBuf>,

    /// Generate this many mock galaxies instead of reading a catalog.
    #[arg(long, conflicts_with = "catalog")]
    mock: Option<usize>,

    /// Seed for the mock catalog.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Display frame.
    #[arg(long, value_enum, default_value = "equatorial")]
    frame: FrameArg,

    /// Central longitude in degrees (frame default if omitted).
    #[arg(long, allow_hyphen_values = true)]
    center: Option<f64>,

    /// Hide pulsars from selections.
    #[arg(long)]
    hide_pulsars: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FrameArg {
    Equatorial,
    Galactic,
}

impl From<FrameArg> for Frame {
    fn from(f: FrameArg) -> Self {
        match f {
            FrameArg::Equatorial => Frame::Equatorial,
            FrameArg::Galactic => Frame::Galactic,
        }
    }
}

fn load_config(path: Option<&Path>) -> ViewConfig {
    match path {
        Some(p) => ViewConfig::from_json_file(p).unwrap_or_else(|e| {
            eprintln!("Failed to load config {}: {e}", p.display());
            process::exit(1);
        }),
        None => ViewConfig::default(),
    }
}

fn open_output(path: Option<&Path>) -> Box<dyn Write> {
    match path {
        Some(p) => {
            let f = File::create(p).unwrap_or_else(|e| {
                eprintln!("Failed to create {}: {e}", p.display());
                process::exit(1);
            });
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    }
}

fn fail_write(e: io::Error) -> ! {
    eprintln!("Failed to write output: {e}");
    process::exit(1);
}

fn load_galaxies(view: &ViewArgs) -> Vec<SkyPoint> {
    if let Some(n) = view.mock {
        let mut rng = StdRng::seed_from_u64(view.seed);
        return ingest::mock_catalog(n, &mut rng);
    }
    let Some(path) = &view.catalog else {
        return Vec::new();
    };
    let ingested = ingest::load_galaxy_catalog(path).unwrap_or_else(|e| {
        eprintln!("Failed to load catalog {}: {e}", path.display());
        process::exit(1);
    });
    if !ingested.rejected.is_empty() {
        eprintln!("Skipped {} malformed rows", ingested.rejected.len());
    }
    ingested.items
}

fn load_pulsars(view: &ViewArgs) -> Vec<SkyPoint> {
    let Some(path) = &view.pulsars else {
        return Vec::new();
    };
    ingest::load_pulsars(path).unwrap_or_else(|e| {
        eprintln!("Failed to load pulsars {}: {e}", path.display());
        process::exit(1);
    })
}

fn load_map(path: &Path) -> HealpixMap {
    ingest::load_probability_map(path).unwrap_or_else(|e| {
        eprintln!("Failed to load probability map {}: {e}", path.display());
        process::exit(1);
    })
}

/// Build a view with the catalog loaded and the requested frame and centre.
fn build_view(config: ViewConfig, view: &ViewArgs) -> ViewState {
    let mut filters = config.filters;
    filters.show_pulsars = !view.hide_pulsars;

    let mut state = ViewState::new(config)
        .apply(ViewEvent::LoadGalaxies(load_galaxies(view)))
        .apply(ViewEvent::LoadPulsars(load_pulsars(view)))
        .apply(ViewEvent::SetFilters(filters))
        .apply(ViewEvent::SetFrame(view.frame.into()));
    if let Some(center) = view.center {
        state = state.apply(ViewEvent::SetCenter(center));
    }
    eprintln!("Loaded {} points", state.points().len());
    state
}

fn parse_vertices(s: &str) -> Vec<(f64, f64)> {
    s.split_whitespace()
        .map(|pair| {
            let coords: Option<(f64, f64)> = pair
                .split_once(',')
                .and_then(|(x, y)| Some((x.trim().parse().ok()?, y.trim().parse().ok()?)));
            coords.unwrap_or_else(|| {
                eprintln!("Invalid vertex \"{pair}\": expected x,y");
                process::exit(1);
            })
        })
        .collect()
}

fn cmd_project(config: ViewConfig, view: &ViewArgs, output: Option<&Path>) {
    let frame: Frame = view.frame.into();
    let center = view.center.unwrap_or(frame.default_center());
    let mut points = load_galaxies(view);
    points.extend(load_pulsars(view));

    let projector = config.projector();
    let projected = project_all(&points, &projector, frame, center);

    let mut out = open_output(output);
    write_projection(&mut out, &points, &projected).unwrap_or_else(|e| fail_write(e));
    eprintln!("Projected {} points", projected.len());
}

fn write_projection(
    out: &mut dyn Write,
    points: &[SkyPoint],
    projected: &[ProjectedPoint],
) -> io::Result<()> {
    writeln!(out, "id,x,y,lon,lat")?;
    for p in projected {
        writeln!(
            out,
            "{},{:.3},{:.3},{:.6},{:.6}",
            points[p.index].id, p.x, p.y, p.lon, p.lat
        )?;
    }
    out.flush()
}

fn cmd_select(
    config: ViewConfig,
    view: &ViewArgs,
    vertices: Option<&str>,
    polygon: bool,
    search: Option<&str>,
    output: Option<&Path>,
) {
    let mut state = build_view(config, view);

    if let Some(query) = search {
        state = state.apply(ViewEvent::Search(query.to_string()));
    } else if let Some(v) = vertices {
        let path = parse_vertices(v);
        let Some((&(x0, y0), rest)) = path.split_first() else {
            eprintln!("At least one vertex is required");
            process::exit(1);
        };
        if polygon {
            state = state.apply(ViewEvent::SetMode(Mode::Polygon));
            for &(x, y) in &path {
                state = state
                    .apply(ViewEvent::PointerDown { x, y })
                    .apply(ViewEvent::PointerUp { x, y });
            }
            if state.is_drawing() {
                state = state.apply(ViewEvent::DoubleClick);
            }
        } else {
            state = state.apply(ViewEvent::PointerDown { x: x0, y: y0 });
            for &(x, y) in rest {
                state = state.apply(ViewEvent::PointerMove { x, y });
            }
            state = state.apply(ViewEvent::PointerUp { x: x0, y: y0 });
        }
    }

    write_selection(&state, output);
}

fn cmd_credible(map_path: &Path, level: f64, output: Option<&Path>) {
    let map = load_map(map_path);
    let region = map.region();
    let threshold = region.threshold(level);
    let pixels = map.region_pixels(level);

    eprintln!(
        "nside={} npix={} total={:.6}",
        map.nside(),
        map.npix(),
        region.total()
    );
    eprintln!(
        "level={level} threshold={threshold:.6e} pixels={} mass={:.6} area={:.2} deg^2",
        pixels.len(),
        region.region_mass(level),
        map.region_area_deg2(level)
    );

    let mut out = open_output(output);
    write_region(&mut out, &map, &pixels).unwrap_or_else(|e| fail_write(e));
}

fn write_region(out: &mut dyn Write, map: &HealpixMap, pixels: &[u64]) -> io::Result<()> {
    let probs = map.probabilities();
    writeln!(out, "ipix,ra,dec,prob")?;
    for &ipix in pixels {
        let (ra, dec) = healpix::pix2radec_ring(map.nside(), ipix);
        writeln!(out, "{ipix},{ra:.6},{dec:.6},{}", probs[ipix as usize])?;
    }
    out.flush()
}

fn cmd_posterior(
    config: ViewConfig,
    view: &ViewArgs,
    map: Option<&Path>,
    samples: Option<&Path>,
    level: Option<f64>,
    output: Option<&Path>,
) {
    let mut state = build_view(config, view);

    if let Some(path) = map {
        state = state.apply(ViewEvent::ActivateMap(load_map(path)));
    } else if let Some(path) = samples {
        let ingested = ingest::load_samples(path).unwrap_or_else(|e| {
            eprintln!("Failed to load samples {}: {e}", path.display());
            process::exit(1);
        });
        if !ingested.rejected.is_empty() {
            eprintln!("Skipped {} malformed samples", ingested.rejected.len());
        }
        state = state.apply(ViewEvent::ActivateSamples(ingested.items));
    }
    if let Some(level) = level {
        state = state.apply(ViewEvent::SetCredibleLevel(level));
    }
    state = state.apply(ViewEvent::SetMode(Mode::Posterior));

    if let Some(t) = state.credible_threshold() {
        eprintln!("level={} threshold={t:.6e}", state.credible_level());
    }
    write_selection(&state, output);
}

fn write_selection(state: &ViewState, output: Option<&Path>) {
    let selected = state.selected_points();
    let mut out = open_output(output);
    let n = write_csv(&mut out, selected.iter().copied())
        .and_then(|n| out.flush().map(|()| n))
        .unwrap_or_else(|e| fail_write(e));
    eprintln!("Selected {n} points");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match &cli.command {
        Commands::Project { view, output } => cmd_project(config, view, output.as_deref()),
        Commands::Select {
            view,
            vertices,
            polygon,
            search,
            output,
        } => cmd_select(
            config,
            view,
            vertices.as_deref(),
            *polygon,
            search.as_deref(),
            output.as_deref(),
        ),
        Commands::Credible { map, level, output } => cmd_credible(map, *level, output.as_deref()),
        Commands::Posterior {
            view,
            map,
            samples,
            level,
            output,
        } => cmd_posterior(
            config,
            view,
            map.as_deref(),
            samples.as_deref(),
            *level,
            output.as_deref(),
        ),
    }
}
