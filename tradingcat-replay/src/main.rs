use fnv::FnvHashMap;
use serde::Deserialize;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tradingcat_data::{
    Detection, Detector, KLine, KLineType, KLinesDataContainer, SessionId, StockExchangeId,
    TradingData, UserConfig,
    detector::worker::{DetectorWorker, DetectorWorkerConfig},
};

/// One line of the replay file: a batch of candles for one series of one exchange.
#[derive(Debug, Deserialize)]
struct KLinesBatch {
    #[serde(rename = "StockExchange")]
    stock_exchange_id: StockExchangeId,
    #[serde(rename = "KLines")]
    klines: Vec<KLine>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting tradingcat kline replay");

    // Configurable via TRADINGCAT_EXCHANGES env var (default: BINANCE,BYBIT,OKX)
    let exchanges = std::env::var("TRADINGCAT_EXCHANGES")
        .unwrap_or_else(|_| "BINANCE,BYBIT,OKX".to_string())
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| StockExchangeId::new(SmolStr::new(name)))
        .collect::<Vec<_>>();

    // Configurable via TRADINGCAT_REPLAY_PATH env var (default: klines.jsonl)
    let replay_path =
        std::env::var("TRADINGCAT_REPLAY_PATH").unwrap_or_else(|_| "klines.jsonl".to_string());

    // Configurable via TRADINGCAT_DETECT_BUFFER_SIZE env var (default: 1,000)
    let buffer_size = std::env::var("TRADINGCAT_DETECT_BUFFER_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_000);

    // Configurable via TRADINGCAT_INTERVALS env var (default: every interval)
    let intervals = match std::env::var("TRADINGCAT_INTERVALS") {
        Ok(intervals) => KLineType::parse_list(&intervals)?,
        Err(_) => KLineType::ALL.to_vec(),
    };
    info!(
        intervals = %intervals
            .iter()
            .map(KLineType::as_str)
            .collect::<Vec<_>>()
            .join(","),
        "Replaying intervals"
    );

    let sessions = load_sessions()?;

    let store = Arc::new(KLinesDataContainer::new(exchanges)?);
    info!(
        exchanges = store.get_stock_exchange_list().len(),
        "KLinesDataContainer initialised"
    );

    let (detector, mut detections, worker) = DetectorWorker::new(Detector::new(Arc::clone(&store)))
        .with_config(DetectorWorkerConfig::default().with_channel_buffer_size(buffer_size))
        .start();

    for (session_id, config) in sessions {
        detector.user_online(session_id, config)?;
    }

    let consumer = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(detection) = detections.recv().await {
            count += 1;
            log_detection(&detection);
        }
        count
    });

    let trading_data = TradingData::new(store).with_detector(detector);

    info!("Replaying kline batches from {}", replay_path);
    let contents = std::fs::read_to_string(&replay_path)?;

    let mut batches = 0usize;
    for (line_number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let batch = match serde_json::from_str::<KLinesBatch>(line) {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to parse line {}: {}", line_number + 1, e);
                continue;
            }
        };

        if let Some(kline) = batch.klines.first() {
            if !intervals.contains(&kline.id().interval) {
                debug!(line = line_number + 1, kline = %kline.id(), "skipping kline batch interval");
                continue;
            }
        }

        match trading_data.add_klines(&batch.stock_exchange_id, batch.klines) {
            Ok(stats) => {
                batches += 1;
                debug!(
                    line = line_number + 1,
                    exchange = %batch.stock_exchange_id,
                    inserted = stats.inserted,
                    synthesized = stats.synthesized,
                    dropped = stats.dropped,
                    "replayed kline batch"
                );
            }
            Err(e) if e.is_contract_violation() => {
                warn!("Rejected kline batch on line {}: {}", line_number + 1, e);
            }
            Err(e) => {
                error!("Detector unavailable, stopping replay: {}", e);
                break;
            }
        }
    }

    for exchange in trading_data.get_stock_exchange_list() {
        info!(
            exchange = %exchange,
            series = trading_data.get_kline_list(exchange).len(),
            "replay summary"
        );
    }
    info!(
        batches,
        money_count = trading_data.money_count(),
        "Replay complete"
    );

    // Dropping the last DetectorHandle stops the worker and closes the detection channel
    drop(trading_data);
    worker.await?;
    let detected = consumer.await?;
    info!(detected, "Detector worker drained");

    Ok(())
}

/// Load session configurations from the JSON object at TRADINGCAT_SESSIONS_PATH, if set.
///
/// Format: `{"<sessionId>": {"Filter": {...}}, ...}`
fn load_sessions() -> Result<Vec<(SessionId, UserConfig)>, Box<dyn std::error::Error>> {
    let Ok(path) = std::env::var("TRADINGCAT_SESSIONS_PATH") else {
        warn!("TRADINGCAT_SESSIONS_PATH not set, replaying without sessions");
        return Ok(Vec::new());
    };

    let raw = serde_json::from_str::<FnvHashMap<String, serde_json::Value>>(
        &std::fs::read_to_string(&path)?,
    )?;

    let mut sessions = Vec::with_capacity(raw.len());
    for (session_id, config) in raw {
        let session_id = session_id.parse::<SessionId>()?;
        let config = UserConfig::from_json(&config.to_string())?;
        sessions.push((session_id, config));
    }

    info!("Loaded {} sessions from {}", sessions.len(), path);
    Ok(sessions)
}

fn log_detection(detection: &Detection) {
    info!(
        session_id = detection.session_id,
        filter = %detection.data.filter_activate,
        history = detection.data.history.len(),
        review_history = detection.data.review_history.len(),
        "{}",
        detection.data.msg
    );
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
