//! DXLink streaming client for option quotes and greeks.
//!
//! One call to [`DxLinkStreamer::collect`] opens a websocket to the vendor
//! URL handed out with the quote token, walks the handshake, subscribes every
//! requested streamer symbol to `Quote` and `Greeks`, and reads until either
//! every symbol has both or the collection deadline passes.
//!
//! # Protocol states
//!
//! ```text
//! Disconnected ─connect─► Connected ─SETUP─► SetupSent ─AUTH─► Authenticated
//!     ─CHANNEL_REQUEST─► ChannelOpen ─FEED_SETUP+FEED_SUBSCRIPTION─► Subscribed
//!     ─► Collecting ─► Closed
//! ```
//!
//! Transitions are linear. AUTH is not acknowledged before the channel is
//! requested; a rejected token shows up as missing data, not as an error.
//!
//! # Message format
//!
//! ```json
//! {"type":"FEED_DATA","channel":3,"data":["Quote",["Quote",".XYZ261106P95",1.2,1.3,10,12]]}
//! ```
//!
//! COMPACT payloads alternate an event type and a flat value list laid out in
//! the order of the accepted field list. FULL payloads are arrays of objects.

use crate::error::{Result, TastytradeError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use wheel_scan_core::config::ScreenerConfig;
use wheel_scan_core::traits::MarketDataStream;
use wheel_scan_core::types::{GreeksSnapshot, MarketSnapshot, QuoteSnapshot, QuoteToken};

/// Protocol version announced in SETUP.
pub const DXLINK_VERSION: &str = "0.1-DXF-JS/0.3.0";

/// Channel used for SETUP, AUTH and KEEPALIVE.
pub const CONTROL_CHANNEL: u32 = 0;

pub const QUOTE_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "bidPrice",
    "askPrice",
    "bidSize",
    "askSize",
];

pub const GREEKS_FIELDS: &[&str] = &[
    "eventType",
    "eventSymbol",
    "delta",
    "gamma",
    "theta",
    "rho",
    "vega",
    "volatility",
];

// =============================================================================
// State
// =============================================================================

/// Where a streaming session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StreamState {
    Disconnected,
    Connected,
    SetupSent,
    Authenticated,
    ChannelOpen,
    Subscribed,
    Collecting,
    Closed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct DxLinkConfig {
    pub feed_channel: u32,
    pub keepalive_timeout: Duration,
    pub collection_deadline: Duration,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    /// Seconds the server may aggregate events for.
    pub aggregation_period: f64,
}

impl Default for DxLinkConfig {
    fn default() -> Self {
        Self::from(&ScreenerConfig::default())
    }
}

impl From<&ScreenerConfig> for DxLinkConfig {
    fn from(config: &ScreenerConfig) -> Self {
        Self {
            feed_channel: config.feed_channel,
            keepalive_timeout: Duration::from_secs(config.keepalive_timeout_secs),
            collection_deadline: config.collection_deadline(),
            read_timeout: config.read_timeout(),
            connect_timeout: config.connect_timeout(),
            aggregation_period: 0.1,
        }
    }
}

impl DxLinkConfig {
    #[must_use]
    pub fn with_collection_deadline(mut self, deadline: Duration) -> Self {
        self.collection_deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A text-framed duplex connection to the feed.
#[async_trait]
pub trait FeedTransport: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next text frame, or `None` once the peer has closed the connection.
    /// Must be cancel safe: the collector wraps it in a per-read timeout.
    async fn recv(&mut self) -> Result<Option<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens transports; swapped for scripted connections in tests.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedTransport>>;
}

/// `tokio-tungstenite` websocket transport.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedTransport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(data))) => {
                    if let Ok(text) = String::from_utf8(data) {
                        return Ok(Some(text));
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    self.stream.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(frame = ?frame, "feed sent close frame");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn FeedTransport>> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TastytradeError::WebSocket(format!("connect to {url} failed: {e}")))?;
        Ok(Box::new(WsTransport { stream }))
    }
}

// =============================================================================
// Outbound frames
// =============================================================================

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Setup {
        channel: u32,
        version: &'static str,
        keepalive_timeout: u64,
        accept_keepalive_timeout: u64,
    },
    Auth {
        channel: u32,
        token: String,
    },
    ChannelRequest {
        channel: u32,
        service: &'static str,
        parameters: ChannelParameters,
    },
    #[serde(rename_all = "camelCase")]
    FeedSetup {
        channel: u32,
        accept_aggregation_period: f64,
        accept_data_format: &'static str,
        accept_event_fields: BTreeMap<&'static str, &'static [&'static str]>,
    },
    FeedSubscription {
        channel: u32,
        reset: bool,
        add: Vec<Subscription>,
    },
    Keepalive {
        channel: u32,
    },
}

impl ClientFrame {
    /// Wire name, safe to log (the AUTH frame carries a token).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "SETUP",
            Self::Auth { .. } => "AUTH",
            Self::ChannelRequest { .. } => "CHANNEL_REQUEST",
            Self::FeedSetup { .. } => "FEED_SETUP",
            Self::FeedSubscription { .. } => "FEED_SUBSCRIPTION",
            Self::Keepalive { .. } => "KEEPALIVE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelParameters {
    pub contract: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub symbol: String,
}

// =============================================================================
// Inbound frames
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Quote,
    Greeks,
}

impl EventKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Quote" => Some(Self::Quote),
            "Greeks" => Some(Self::Greeks),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "Quote",
            Self::Greeks => "Greeks",
        }
    }

    const fn accepted_fields(self) -> &'static [&'static str] {
        match self {
            Self::Quote => QUOTE_FIELDS,
            Self::Greeks => GREEKS_FIELDS,
        }
    }
}

/// One normalised event. Only finite numeric fields are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub kind: EventKind,
    pub symbol: String,
    pub fields: HashMap<String, f64>,
}

impl FeedEvent {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// Server frames the collector cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    FeedData { channel: u32, data: Value },
    FeedConfig { channel: u32, event_fields: HashMap<String, Vec<String>> },
    AuthState { state: String },
    Error { error: String, message: String },
    Other { kind: String },
}

/// Decodes a text frame; `None` for anything that is not a typed JSON object.
#[must_use]
pub fn parse_server_frame(text: &str) -> Option<ServerFrame> {
    let value: Value = serde_json::from_str(text).ok()?;
    let kind = value.get("type")?.as_str()?.to_string();
    let channel = value
        .get("channel")
        .and_then(Value::as_u64)
        .and_then(|c| u32::try_from(c).ok())
        .unwrap_or(CONTROL_CHANNEL);

    let frame = match kind.as_str() {
        "FEED_DATA" => ServerFrame::FeedData {
            channel,
            data: value.get("data").cloned().unwrap_or(Value::Null),
        },
        "FEED_CONFIG" => ServerFrame::FeedConfig {
            channel,
            event_fields: value
                .get("eventFields")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
        },
        "AUTH_STATE" => ServerFrame::AuthState {
            state: string_field(&value, "state"),
        },
        "ERROR" => ServerFrame::Error {
            error: string_field(&value, "error"),
            message: string_field(&value, "message"),
        },
        _ => ServerFrame::Other { kind },
    };
    Some(frame)
}

fn string_field(value: &Value, name: &str) -> String {
    value
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Numbers may arrive as JSON numbers, numeric strings or `"NaN"`.
fn to_opt_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Field order per event kind for COMPACT payloads.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    fields: HashMap<EventKind, Vec<String>>,
}

impl Default for FieldLayout {
    fn default() -> Self {
        let fields = [EventKind::Quote, EventKind::Greeks]
            .into_iter()
            .map(|kind| {
                let names: Vec<String> =
                    kind.accepted_fields().iter().map(|s| (*s).to_string()).collect();
                (kind, names)
            })
            .collect();
        Self { fields }
    }
}

impl FieldLayout {
    /// Adopts the field order the server confirmed in FEED_CONFIG.
    pub fn update(&mut self, event_fields: &HashMap<String, Vec<String>>) {
        for (name, fields) in event_fields {
            if let Some(kind) = EventKind::parse(name) {
                if !fields.is_empty() {
                    self.fields.insert(kind, fields.clone());
                }
            }
        }
    }

    fn fields(&self, kind: EventKind) -> &[String] {
        self.fields.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Normalises a FEED_DATA payload. Malformed records are skipped.
#[must_use]
pub fn parse_feed_data(data: &Value, layout: &FieldLayout) -> Vec<FeedEvent> {
    let mut events = Vec::new();
    match data {
        Value::Array(items) if items.first().is_some_and(Value::is_string) => {
            for pair in items.chunks(2) {
                let [kind, values] = pair else {
                    trace!("dangling event type in compact payload");
                    continue;
                };
                let Some(kind) = kind.as_str().and_then(EventKind::parse) else {
                    trace!(kind = %kind, "skipping unsubscribed event type");
                    continue;
                };
                let Some(values) = values.as_array() else {
                    continue;
                };
                let fields = layout.fields(kind);
                if fields.is_empty() {
                    continue;
                }
                for record in values.chunks_exact(fields.len()) {
                    if let Some(event) = compact_event(kind, fields, record) {
                        events.push(event);
                    }
                }
            }
        }
        Value::Array(items) => {
            events.extend(items.iter().filter_map(full_event));
        }
        Value::Object(_) => events.extend(full_event(data)),
        _ => trace!("unrecognised feed payload"),
    }
    events
}

fn compact_event(kind: EventKind, fields: &[String], record: &[Value]) -> Option<FeedEvent> {
    let mut symbol = None;
    let mut values = HashMap::new();
    for (name, value) in fields.iter().zip(record) {
        match name.as_str() {
            "eventSymbol" => symbol = value.as_str().map(str::to_string),
            "eventType" => {
                if value.as_str() != Some(kind.as_str()) {
                    return None;
                }
            }
            _ => {
                if let Some(n) = to_opt_f64(value) {
                    values.insert(name.clone(), n);
                }
            }
        }
    }
    Some(FeedEvent {
        kind,
        symbol: symbol.filter(|s| !s.is_empty())?,
        fields: values,
    })
}

fn full_event(value: &Value) -> Option<FeedEvent> {
    let object = value.as_object()?;
    let kind = EventKind::parse(object.get("eventType")?.as_str()?)?;
    let symbol = object.get("eventSymbol")?.as_str()?.to_string();
    let fields = object
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), "eventType" | "eventSymbol"))
        .filter_map(|(name, v)| to_opt_f64(v).map(|n| (name.clone(), n)))
        .collect();
    Some(FeedEvent {
        kind,
        symbol,
        fields,
    })
}

// =============================================================================
// Completion tracking
// =============================================================================

/// Symbols still waiting for a quote and for greeks.
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    missing_quotes: HashSet<String>,
    missing_greeks: HashSet<String>,
}

impl CompletionTracker {
    pub fn new<'a>(symbols: impl IntoIterator<Item = &'a String>) -> Self {
        let missing: HashSet<String> = symbols.into_iter().cloned().collect();
        Self {
            missing_quotes: missing.clone(),
            missing_greeks: missing,
        }
    }

    pub fn quote_received(&mut self, symbol: &str) {
        self.missing_quotes.remove(symbol);
    }

    pub fn greeks_received(&mut self, symbol: &str) {
        self.missing_greeks.remove(symbol);
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_quotes.is_empty() && self.missing_greeks.is_empty()
    }

    #[must_use]
    pub fn missing_quotes(&self) -> usize {
        self.missing_quotes.len()
    }

    #[must_use]
    pub fn missing_greeks(&self) -> usize {
        self.missing_greeks.len()
    }
}

/// Folds events into the snapshot for the requested symbols.
struct Collector {
    requested: HashSet<String>,
    snapshot: MarketSnapshot,
    tracker: CompletionTracker,
    layout: FieldLayout,
}

impl Collector {
    fn new(symbols: &[String]) -> Self {
        let requested: HashSet<String> = symbols.iter().cloned().collect();
        let tracker = CompletionTracker::new(&requested);
        Self {
            requested,
            snapshot: MarketSnapshot::default(),
            tracker,
            layout: FieldLayout::default(),
        }
    }

    fn apply(&mut self, event: FeedEvent) {
        if !self.requested.contains(&event.symbol) {
            trace!(symbol = %event.symbol, "event for unrequested symbol");
            return;
        }
        match event.kind {
            EventKind::Quote => {
                let bid = event.field("bidPrice").and_then(|v| Decimal::try_from(v).ok());
                let ask = event.field("askPrice").and_then(|v| Decimal::try_from(v).ok());
                // an unpriced (NaN/NaN) quote still counts as received
                let quote = self
                    .snapshot
                    .quotes
                    .entry(event.symbol.clone())
                    .or_insert_with(QuoteSnapshot::default);
                if bid.is_some() {
                    quote.bid = bid;
                }
                if ask.is_some() {
                    quote.ask = ask;
                }
                self.tracker.quote_received(&event.symbol);
            }
            EventKind::Greeks => {
                let Some(delta) = event.field("delta") else {
                    return;
                };
                let greeks = self
                    .snapshot
                    .greeks
                    .entry(event.symbol.clone())
                    .or_insert_with(|| GreeksSnapshot::with_delta(delta));
                greeks.delta = delta;
                for (name, slot) in [
                    ("gamma", &mut greeks.gamma),
                    ("theta", &mut greeks.theta),
                    ("rho", &mut greeks.rho),
                    ("vega", &mut greeks.vega),
                    ("volatility", &mut greeks.volatility),
                ] {
                    if let Some(v) = event.field(name) {
                        *slot = Some(v);
                    }
                }
                self.tracker.greeks_received(&event.symbol);
            }
        }
    }
}

// =============================================================================
// Streamer
// =============================================================================

/// Why collection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Complete,
    Deadline,
    Cancelled,
    PeerClosed,
}

/// Bounded-time DXLink snapshot collector.
pub struct DxLinkStreamer<C = WsConnector> {
    connector: C,
    config: DxLinkConfig,
}

impl DxLinkStreamer<WsConnector> {
    #[must_use]
    pub fn new(config: DxLinkConfig) -> Self {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: FeedConnector> DxLinkStreamer<C> {
    pub fn with_connector(connector: C, config: DxLinkConfig) -> Self {
        Self { connector, config }
    }

    #[must_use]
    pub fn config(&self) -> &DxLinkConfig {
        &self.config
    }

    /// Collects quotes and greeks for `symbols` until complete, cancelled or
    /// past the collection deadline. The connection is closed on every path.
    ///
    /// # Errors
    /// Returns [`TastytradeError::Stream`] on connect failure or a transport
    /// error, carrying the last state reached.
    pub async fn collect(
        &self,
        quote_token: &QuoteToken,
        symbols: &[String],
        cancel: CancellationToken,
    ) -> Result<MarketSnapshot> {
        if symbols.is_empty() {
            debug!("no symbols requested, skipping stream");
            return Ok(MarketSnapshot::default());
        }

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            self.connector.connect(&quote_token.dxlink_url),
        )
        .await;
        let transport = match connect {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => return Err(TastytradeError::stream(StreamState::Disconnected, e.to_string())),
            Err(_) => {
                return Err(TastytradeError::stream(
                    StreamState::Disconnected,
                    format!("connect timed out after {:?}", self.config.connect_timeout),
                ))
            }
        };

        let mut session = Session {
            transport,
            state: StreamState::Connected,
            config: &self.config,
            last_sent: Instant::now(),
        };
        debug!(url = %quote_token.dxlink_url, symbols = symbols.len(), "feed connected");

        let outcome = session.run(quote_token, symbols, &cancel).await;
        session.close().await;
        outcome
    }
}

#[async_trait]
impl<C: FeedConnector> MarketDataStream for DxLinkStreamer<C> {
    async fn collect(
        &self,
        quote_token: &QuoteToken,
        symbols: &[String],
        cancel: CancellationToken,
    ) -> wheel_scan_core::Result<MarketSnapshot> {
        DxLinkStreamer::collect(self, quote_token, symbols, cancel)
            .await
            .map_err(TastytradeError::into_stream_error)
    }
}

struct Session<'a> {
    transport: Box<dyn FeedTransport>,
    state: StreamState,
    config: &'a DxLinkConfig,
    last_sent: Instant,
}

impl Session<'_> {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        trace!(kind = frame.kind(), state = %self.state, "sending frame");
        self.transport
            .send(text)
            .await
            .map_err(|e| TastytradeError::stream(self.state, e.to_string()))?;
        self.last_sent = Instant::now();
        Ok(())
    }

    async fn advance(&mut self, frame: ClientFrame, next: StreamState) -> Result<()> {
        self.send(&frame).await?;
        self.state = next;
        Ok(())
    }

    async fn run(
        &mut self,
        quote_token: &QuoteToken,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> Result<MarketSnapshot> {
        self.handshake(quote_token, symbols).await?;

        let mut collector = Collector::new(symbols);
        let reason = self.collect_events(&mut collector, cancel).await?;

        info!(
            reason = ?reason,
            quotes = collector.snapshot.quotes.len(),
            greeks = collector.snapshot.greeks.len(),
            missing_quotes = collector.tracker.missing_quotes(),
            missing_greeks = collector.tracker.missing_greeks(),
            "feed collection finished"
        );
        Ok(collector.snapshot)
    }

    async fn handshake(&mut self, quote_token: &QuoteToken, symbols: &[String]) -> Result<()> {
        let keepalive = self.config.keepalive_timeout.as_secs();
        let channel = self.config.feed_channel;

        self.advance(
            ClientFrame::Setup {
                channel: CONTROL_CHANNEL,
                version: DXLINK_VERSION,
                keepalive_timeout: keepalive,
                accept_keepalive_timeout: keepalive,
            },
            StreamState::SetupSent,
        )
        .await?;

        self.advance(
            ClientFrame::Auth {
                channel: CONTROL_CHANNEL,
                token: quote_token.token.clone(),
            },
            StreamState::Authenticated,
        )
        .await?;

        self.advance(
            ClientFrame::ChannelRequest {
                channel,
                service: "FEED",
                parameters: ChannelParameters { contract: "AUTO" },
            },
            StreamState::ChannelOpen,
        )
        .await?;

        let accept_event_fields = [EventKind::Quote, EventKind::Greeks]
            .into_iter()
            .map(|kind| (kind.as_str(), kind.accepted_fields()))
            .collect();
        self.send(&ClientFrame::FeedSetup {
            channel,
            accept_aggregation_period: self.config.aggregation_period,
            accept_data_format: "COMPACT",
            accept_event_fields,
        })
        .await?;

        let add = symbols
            .iter()
            .flat_map(|symbol| {
                [EventKind::Quote, EventKind::Greeks].map(|kind| Subscription {
                    event_type: kind.as_str(),
                    symbol: symbol.clone(),
                })
            })
            .collect();
        self.advance(
            ClientFrame::FeedSubscription {
                channel,
                reset: true,
                add,
            },
            StreamState::Subscribed,
        )
        .await?;

        debug!(channel, symbols = symbols.len(), "feed subscribed");
        Ok(())
    }

    async fn collect_events(
        &mut self,
        collector: &mut Collector,
        cancel: &CancellationToken,
    ) -> Result<StopReason> {
        self.state = StreamState::Collecting;
        let deadline = tokio::time::sleep(self.config.collection_deadline);
        tokio::pin!(deadline);
        let keepalive_every = self.config.keepalive_timeout / 2;

        loop {
            if collector.tracker.is_complete() {
                return Ok(StopReason::Complete);
            }
            if !keepalive_every.is_zero() && self.last_sent.elapsed() >= keepalive_every {
                self.send(&ClientFrame::Keepalive {
                    channel: CONTROL_CHANNEL,
                })
                .await?;
            }

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("feed collection cancelled");
                    return Ok(StopReason::Cancelled);
                }
                () = &mut deadline => {
                    debug!(
                        missing_quotes = collector.tracker.missing_quotes(),
                        missing_greeks = collector.tracker.missing_greeks(),
                        "collection deadline reached"
                    );
                    return Ok(StopReason::Deadline);
                }
                read = tokio::time::timeout(self.config.read_timeout, self.transport.recv()) => {
                    match read {
                        Err(_) => continue,
                        Ok(Ok(Some(text))) => self.handle_text(&text, collector),
                        Ok(Ok(None)) => {
                            warn!("feed closed by server during collection");
                            return Ok(StopReason::PeerClosed);
                        }
                        Ok(Err(e)) => {
                            return Err(TastytradeError::stream(self.state, e.to_string()));
                        }
                    }
                }
            }
        }
    }

    fn handle_text(&self, text: &str, collector: &mut Collector) {
        let Some(frame) = parse_server_frame(text) else {
            trace!("skipping malformed frame");
            return;
        };
        match frame {
            ServerFrame::FeedData { channel, data } if channel == self.config.feed_channel => {
                for event in parse_feed_data(&data, &collector.layout) {
                    collector.apply(event);
                }
            }
            ServerFrame::FeedConfig {
                channel,
                event_fields,
            } if channel == self.config.feed_channel => {
                collector.layout.update(&event_fields);
            }
            ServerFrame::AuthState { state } => debug!(auth_state = %state, "feed auth state"),
            ServerFrame::Error { error, message } => {
                warn!(error = %error, message = %message, "feed reported an error");
            }
            other => trace!(frame = ?other, "ignoring frame"),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.transport.close().await {
            trace!(error = %e, "feed close");
        }
        debug!(from = %self.state, "feed closed");
        self.state = StreamState::Closed;
    }
}
