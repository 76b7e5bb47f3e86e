use crate::{
    detector::worker::DetectorHandle,
    error::DataError,
    exchange::StockExchangeId,
    kline::{KLine, KLineId},
    store::{InsertStats, KLinesDataContainer},
};
use fnv::FnvHashSet;
use std::sync::Arc;

/// Ingestion entry point shared by every exchange feed.
///
/// Each batch is merged into the [`KLinesDataContainer`] first, then a copy is queued for the
/// [`DetectorWorker`](crate::detector::worker::DetectorWorker), if one is attached.
#[derive(Debug, Clone)]
pub struct TradingData {
    store: Arc<KLinesDataContainer>,
    detector: Option<DetectorHandle>,
}

impl TradingData {
    pub fn new(store: Arc<KLinesDataContainer>) -> Self {
        Self {
            store,
            detector: None,
        }
    }

    pub fn with_detector(self, detector: DetectorHandle) -> Self {
        Self {
            detector: Some(detector),
            ..self
        }
    }

    pub fn add_klines(
        &self,
        stock_exchange_id: &StockExchangeId,
        klines: Vec<KLine>,
    ) -> Result<InsertStats, DataError> {
        let stats = self.store.add_klines(stock_exchange_id, &klines)?;

        if let Some(detector) = &self.detector {
            detector.add_klines(stock_exchange_id.clone(), klines)?;
        }

        Ok(stats)
    }

    pub fn get_klines_on_date(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
        start: i64,
        end: i64,
    ) -> Result<Vec<KLine>, DataError> {
        self.store
            .get_klines_on_date(stock_exchange_id, kline_id, start, end)
    }

    pub fn get_kline_list(&self, stock_exchange_id: &StockExchangeId) -> FnvHashSet<KLineId> {
        self.store.get_kline_list(stock_exchange_id)
    }

    pub fn get_stock_exchange_list(&self) -> &[StockExchangeId] {
        self.store.get_stock_exchange_list()
    }

    pub fn money_count(&self) -> usize {
        self.store.money_count()
    }

    pub fn store(&self) -> &Arc<KLinesDataContainer> {
        &self.store
    }
}
