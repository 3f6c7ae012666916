use anyhow::{Context, Result};
use clap::Parser;
use fgd_dem::{
    DatasetOptions, DemDataset, ElevationEncoder, GeoTiffWriter, MosaicOptions, OutOfRange,
    ParseOptions, RasterSink, TerrainRgbConfig,
};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 入力XMLファイル、ZIPファイル、またはディレクトリ
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// 出力ディレクトリ
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// 出力ファイル名（Terrain-RGBは「<名前>_terrain_rgb.tif」）
    #[arg(short, long, default_value = "output.tif")]
    file_name: String,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,

    /// 海域の欠測値を0mとして扱う
    #[arg(long)]
    sea_at_zero: bool,

    /// 点数がグリッドより少ないtupleListを許容し、末尾を欠測とする
    #[arg(long)]
    allow_short_tuple_list: bool,

    /// Terrain-RGBの範囲外の標高を丸める（デフォルト: エラー）
    #[arg(long)]
    clamp: bool,

    /// メッシュ間の画素サイズの許容誤差（度）
    #[arg(long, default_value_t = 1e-9)]
    tolerance: f64,

    /// 範囲（緯度経度）をJSONで出力して終了
    #[arg(long)]
    bounds: bool,
}

impl Args {
    fn dataset_options(&self) -> DatasetOptions {
        let rgb = TerrainRgbConfig {
            out_of_range: if self.clamp {
                OutOfRange::Clamp
            } else {
                OutOfRange::Fail
            },
            ..Default::default()
        };

        DatasetOptions {
            parse: ParseOptions {
                sea_at_zero: self.sea_at_zero,
                allow_short_tuple_list: self.allow_short_tuple_list,
                ..Default::default()
            },
            mosaic: MosaicOptions {
                tolerance: self.tolerance,
                ..Default::default()
            },
            encoder: ElevationEncoder::new(rgb),
        }
    }
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    info!("Processing input: {:?}", args.input);
    let dataset = DemDataset::open_with(&args.input, &args.dataset_options())
        .with_context(|| format!("Failed to read DEM from {}", args.input.display()))?;

    if args.bounds {
        println!("{}", serde_json::to_string(&dataset.bounds_latlng())?);
        return Ok(());
    }

    let output = args
        .output
        .as_ref()
        .context("--output is required unless --bounds is given")?;

    if !dataset.has_elevation() {
        error!("Output DEM has no elevation data: {:?}", args.input);
        anyhow::bail!("Output DEM has no elevation data");
    }

    // 両方のラスタを作成してから書き出す
    let encoded = dataset.encode()?;

    // 出力ディレクトリの作成
    fs::create_dir_all(output)?;

    let stem = PathBuf::from(&args.file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    let elevation_path = output.join(format!("{}.tif", stem));
    let terrain_rgb_path = output.join(format!("{}_terrain_rgb.tif", stem));

    let writer = GeoTiffWriter::new();
    writer.write_elevation(&encoded.elevation, &elevation_path)?;
    info!("Written GeoTIFF: {:?}", elevation_path);
    writer.write_terrain_rgb(&encoded.terrain_rgb, &terrain_rgb_path)?;
    info!("Written Terrain-RGB: {:?}", terrain_rgb_path);

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}
