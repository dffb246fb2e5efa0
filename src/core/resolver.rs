//! Resolution of a watch page into a stream catalog

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::video_info::{FormatSelectionCriteria, MediaStream, VideoDetails};
use crate::error::ResolveError;
use crate::platform::catalog::{build_video_details, requires_decipher};
use crate::platform::cipher::CipherResolver;
use crate::platform::client::{HttpClientConfig, HttpTransport, ProgressCallback, Transport};
use crate::platform::decipher::{DecipherOperations, SignatureDecipherer};
use crate::platform::formats::select_stream;
use crate::platform::locator::{parse_player_response, player_response_from_pbj};
use crate::platform::sandbox::{DenoSandboxFactory, SandboxFactory};
use crate::utils::cache::{
    script_version_key, CachedDecipher, DecipherCache, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL,
};
use crate::utils::url::{extract_video_id, pbj_url, player_js_url, watch_url, DEFAULT_BASE_URL};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// HTTP settings for page and script requests
    pub http: HttpClientConfig,
    /// Site origin for watch pages and relative script paths
    pub base_url: String,
    /// Population order of criteria built by [`Resolver::criteria`]
    pub adaptive_first: bool,
    /// Retry through the `pbj=1` JSON endpoint when the page has no player response
    pub pbj_fallback: bool,
    /// Lifetime of cached decipher operations
    pub cache_ttl: Duration,
    /// Number of script versions kept in cache
    pub cache_capacity: u64,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            adaptive_first: true,
            pbj_fallback: true,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ResolverOptions {
    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout = timeout;
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.http.connect_timeout = timeout;
        self
    }

    /// Set maximum attempts per request
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.http.max_retries = retries;
        self
    }

    /// Set user agent
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.http.user_agent = user_agent.to_string();
        self
    }

    /// Set site origin
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set population order
    pub fn with_adaptive_first(mut self, adaptive_first: bool) -> Self {
        self.adaptive_first = adaptive_first;
        self
    }

    /// Enable or disable the pbj fallback
    pub fn with_pbj_fallback(mut self, enabled: bool) -> Self {
        self.pbj_fallback = enabled;
        self
    }

    /// Set decipher cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// How signatures will be recovered for one resolution
enum DecipherPlan {
    NotNeeded,
    Ready(Arc<DecipherOperations>),
    Unavailable(String),
}

/// Resolves watch pages into stream catalogs
pub struct Resolver {
    options: ResolverOptions,
    transport: Arc<dyn Transport>,
    sandboxes: Arc<dyn SandboxFactory>,
    cache: DecipherCache,
}

impl Resolver {
    /// Create a resolver with default options
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_options(ResolverOptions::default())
    }

    /// Create a resolver with custom options over the HTTP transport
    pub fn with_options(options: ResolverOptions) -> Result<Self, ResolveError> {
        let transport = Arc::new(HttpTransport::with_config(options.http.clone())?);
        let cache = DecipherCache::with_config(options.cache_ttl, options.cache_capacity);
        Ok(Self {
            options,
            transport,
            sandboxes: Arc::new(DenoSandboxFactory),
            cache,
        })
    }

    /// Replace the transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the sandbox factory
    pub fn with_sandbox_factory(mut self, sandboxes: Arc<dyn SandboxFactory>) -> Self {
        self.sandboxes = sandboxes;
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn cache(&self) -> &DecipherCache {
        &self.cache
    }

    /// Resolve a video URL or ID into its metadata and stream catalog.
    ///
    /// Fails only when no player response can be found; streams whose
    /// signature cannot be recovered are kept with an empty URL.
    pub async fn resolve(&self, input: &str) -> Result<VideoDetails, ResolveError> {
        let video_id = extract_video_id(input)?;
        info!("Resolving video {}", video_id);

        let page = self
            .transport
            .fetch(&watch_url(&self.options.base_url, &video_id), &[])
            .await?;

        let response = match parse_player_response(&page.body) {
            Ok(response) => response,
            Err(e) if self.options.pbj_fallback => {
                debug!("Page extraction failed ({}), trying pbj endpoint", e);
                self.fetch_pbj(&video_id).await.map_err(|pbj_err| {
                    debug!("pbj fallback failed: {}", pbj_err);
                    e
                })?
            }
            Err(e) => return Err(e),
        };

        let plan = self.plan_decipher(&response, &page.body).await;
        let details = self.build_catalog(&response, &video_id, plan);

        info!(
            "Resolved \"{}\": {} streams, {} playable",
            details.title,
            details.stream_count(),
            details.playable_count()
        );
        Ok(details)
    }

    /// Default selection criteria honoring the configured population order
    pub fn criteria(&self) -> FormatSelectionCriteria {
        FormatSelectionCriteria::default().with_adaptive_first(self.options.adaptive_first)
    }

    /// Pick one stream from resolved details
    pub fn choose<'a>(
        &self,
        details: &'a VideoDetails,
        criteria: &FormatSelectionCriteria,
    ) -> Result<&'a MediaStream, ResolveError> {
        select_stream(details, criteria).ok_or(ResolveError::NoStreamFound)
    }

    /// Download a resolved stream to a file
    pub async fn download(
        &self,
        stream: &MediaStream,
        output: &Path,
        progress: &mut ProgressCallback<'_>,
    ) -> Result<u64, ResolveError> {
        if !stream.is_playable() {
            return Err(ResolveError::NoStreamFound);
        }
        self.transport.download(&stream.url, output, progress).await
    }

    async fn fetch_pbj(&self, video_id: &str) -> Result<Value, ResolveError> {
        let headers = [
            ("X-YouTube-Client-Name", "1"),
            ("X-YouTube-Client-Version", "2.20210721"),
        ];
        let reply = self
            .transport
            .fetch(&pbj_url(&self.options.base_url, video_id), &headers)
            .await?;
        if !reply.is_json() {
            return Err(ResolveError::Extraction(
                "pbj endpoint did not return JSON".to_string(),
            ));
        }
        player_response_from_pbj(&reply.body)
    }

    async fn plan_decipher(&self, response: &Value, page: &str) -> DecipherPlan {
        if !requires_decipher(response) {
            return DecipherPlan::NotNeeded;
        }

        let script_url = match player_js_url(page, &self.options.base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Signatures cannot be recovered: {}", e);
                return DecipherPlan::Unavailable(e.to_string());
            }
        };
        let version_key = script_version_key(&script_url);

        let outcome = self
            .cache
            .get_or_init_operations(&version_key, async {
                let script = self.fetch_script(&script_url).await?;
                Ok(self.extract_operations(&script))
            })
            .await;

        match outcome {
            Ok(CachedDecipher::Ready(operations)) => DecipherPlan::Ready(operations),
            Ok(CachedDecipher::Unusable(reason)) => {
                debug!("Player script {} is unusable: {}", script_url, reason);
                DecipherPlan::Unavailable(reason)
            }
            Err(e) => {
                warn!("Signatures cannot be recovered: {}", e);
                DecipherPlan::Unavailable(e.to_string())
            }
        }
    }

    async fn fetch_script(&self, script_url: &str) -> Result<Arc<String>, ResolveError> {
        if let Some(script) = self.cache.get_script(script_url).await {
            return Ok(script);
        }

        info!("Fetching player script {}", script_url);
        let script = Arc::new(self.transport.fetch(script_url, &[]).await?.body);
        self.cache.set_script(script_url, Arc::clone(&script)).await;
        Ok(script)
    }

    /// Run extraction once for a newly seen script version.
    ///
    /// Failure is returned as an outcome so the version stays unusable.
    fn extract_operations(&self, script: &str) -> CachedDecipher {
        let mut engine = SignatureDecipherer::new(self.sandboxes.create());
        match engine.initialize(script) {
            Ok(operations) => CachedDecipher::Ready(operations),
            Err(e) => CachedDecipher::Unusable(e.to_string()),
        }
    }

    /// Build the catalog, deciphering on this thread
    fn build_catalog(&self, response: &Value, video_id: &str, plan: DecipherPlan) -> VideoDetails {
        let mut engine = match plan {
            DecipherPlan::NotNeeded => None,
            DecipherPlan::Unavailable(reason) => {
                debug!("Building catalog without decipherer: {}", reason);
                None
            }
            DecipherPlan::Ready(operations) => Some(SignatureDecipherer::from_operations(
                operations,
                self.sandboxes.create(),
            )),
        };

        match engine.as_mut() {
            Some(engine) => {
                let mut ciphers = CipherResolver::new(engine);
                build_video_details(response, video_id, &mut ciphers)
            }
            None => build_video_details(response, video_id, &mut CipherResolver::unavailable()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video_info::{QualityPreference, StreamTypePreference};
    use crate::platform::sandbox::ScriptSandbox;
    use mockito::Matcher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VIDEO_ID: &str = "dQw4w9WgXcQ";

    const PLAYER_SCRIPT: &str = r#"var Bq={Xy:function(a){a.reverse()}};
Qk=function(a){a=a.split("");Bq.Xy(a,1);return a.join("")};"#;

    fn player_response() -> String {
        serde_json::json!({
            "videoDetails": {"videoId": VIDEO_ID, "title": "Test Video", "lengthSeconds": "10"},
            "streamingData": {
                "formats": [{
                    "itag": 18,
                    "url": "https://media.example.com/18",
                    "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
                    "bitrate": 500000,
                    "height": 360
                }],
                "adaptiveFormats": [{
                    "itag": 137,
                    "signatureCipher": "s=CBA&sp=sig&url=https%3A%2F%2Fmedia.example.com%2F137",
                    "mimeType": "video/mp4; codecs=\"avc1.640028\"",
                    "bitrate": 4000000,
                    "height": 1080
                }]
            }
        })
        .to_string()
    }

    fn watch_page() -> String {
        format!(
            r#"<html><script>ytcfg.set({{"jsUrl":"/s/player/abc/base.js"}});</script><script>var ytInitialPlayerResponse = {};</script></html>"#,
            player_response()
        )
    }

    /// Reverses its argument; counts how many sandboxes were created
    struct ReversingFactory {
        created: AtomicUsize,
    }

    struct ReversingSandbox;

    impl ScriptSandbox for ReversingSandbox {
        fn load(&mut self, _source: &str) -> Result<(), ResolveError> {
            Ok(())
        }

        fn call(&mut self, _function: &str, argument: &str) -> Result<String, ResolveError> {
            Ok(argument.chars().rev().collect())
        }
    }

    impl SandboxFactory for ReversingFactory {
        fn create(&self) -> Box<dyn ScriptSandbox> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(ReversingSandbox)
        }
    }

    fn test_resolver(base_url: &str) -> (Resolver, Arc<ReversingFactory>) {
        let factory = Arc::new(ReversingFactory {
            created: AtomicUsize::new(0),
        });
        let options = ResolverOptions::default()
            .with_base_url(base_url)
            .with_max_retries(1);
        let resolver = Resolver::with_options(options)
            .unwrap()
            .with_sandbox_factory(factory.clone());
        (resolver, factory)
    }

    #[test]
    fn test_resolver_options_default() {
        let options = ResolverOptions::default();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert!(options.adaptive_first);
        assert!(options.pbj_fallback);
        assert_eq!(options.cache_ttl, Duration::from_secs(600));
        assert_eq!(options.http.max_retries, 3);

        let resolver =
            Resolver::with_options(options.with_adaptive_first(false)).unwrap();
        assert!(!resolver.criteria().prefer_adaptive_over_muxed);
    }

    #[tokio::test]
    async fn test_resolve_deciphers_and_caches() {
        let mut server = mockito::Server::new_async().await;
        let page = server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex(format!("^v={}$", VIDEO_ID)))
            .with_status(200)
            .with_body(watch_page())
            .expect(2)
            .create_async()
            .await;
        let script = server
            .mock("GET", "/s/player/abc/base.js")
            .with_status(200)
            .with_body(PLAYER_SCRIPT)
            .expect(1)
            .create_async()
            .await;

        let (resolver, factory) = test_resolver(&server.url());

        let details = resolver.resolve(VIDEO_ID).await.unwrap();
        assert_eq!(details.title, "Test Video");
        assert_eq!(details.formats[0].url, "https://media.example.com/18");
        assert_eq!(
            details.adaptive_formats[0].url,
            "https://media.example.com/137?sig=ABC"
        );

        // Second resolution reuses the extracted operations
        let again = resolver
            .resolve(&format!("https://www.youtube.com/watch?v={}", VIDEO_ID))
            .await
            .unwrap();
        assert_eq!(again.adaptive_formats[0].url, details.adaptive_formats[0].url);

        page.assert_async().await;
        script.assert_async().await;
        // One engine extracts, then one per resolution deciphers
        assert_eq!(factory.created.load(Ordering::SeqCst), 3);
        assert_eq!(resolver.cache().stats().await.operation_entries, 1);

        let criteria = FormatSelectionCriteria::new(
            StreamTypePreference::Any,
            QualityPreference::BestResolution,
        );
        assert_eq!(resolver.choose(&details, &criteria).unwrap().itag, 137);
    }

    #[tokio::test]
    async fn test_unusable_script_keeps_direct_streams() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex(format!("^v={}$", VIDEO_ID)))
            .with_status(200)
            .with_body(watch_page())
            .create_async()
            .await;
        server
            .mock("GET", "/s/player/abc/base.js")
            .with_status(200)
            .with_body("var nothing = 1;")
            .create_async()
            .await;

        let (resolver, _) = test_resolver(&server.url());
        let details = resolver.resolve(VIDEO_ID).await.unwrap();

        assert_eq!(details.adaptive_formats.len(), 1);
        assert!(!details.adaptive_formats[0].is_playable());
        assert!(details.formats[0].is_playable());

        let criteria = FormatSelectionCriteria::new(
            StreamTypePreference::VideoOnly,
            QualityPreference::BestResolution,
        );
        assert!(matches!(
            resolver.choose(&details, &criteria),
            Err(ResolveError::NoStreamFound)
        ));
    }

    #[tokio::test]
    async fn test_unusable_script_version_is_remembered() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex(format!("^v={}$", VIDEO_ID)))
            .with_status(200)
            .with_body(watch_page())
            .expect(3)
            .create_async()
            .await;
        let script = server
            .mock("GET", "/s/player/abc/base.js")
            .with_status(200)
            .with_body("var nothing = 1;")
            .expect(1)
            .create_async()
            .await;

        let (resolver, factory) = test_resolver(&server.url());

        let (first, second) = tokio::join!(resolver.resolve(VIDEO_ID), resolver.resolve(VIDEO_ID));
        assert!(!first.unwrap().adaptive_formats[0].is_playable());
        assert!(!second.unwrap().adaptive_formats[0].is_playable());

        let third = resolver.resolve(VIDEO_ID).await.unwrap();
        assert!(third.formats[0].is_playable());

        script.assert_async().await;
        // Only the single extraction attempt created an engine
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        let key = script_version_key(&format!("{}/s/player/abc/base.js", server.url()));
        assert!(matches!(
            resolver.cache().get_operations(&key).await,
            Some(CachedDecipher::Unusable(_))
        ));
    }

    #[tokio::test]
    async fn test_pbj_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex(format!("^v={}$", VIDEO_ID)))
            .with_status(200)
            .with_body("<html>consent page</html>")
            .create_async()
            .await;
        let pbj = server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex("pbj=1".to_string()))
            .match_header("x-youtube-client-name", "1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"[{{"page":"watch"}},{{"playerResponse":{}}}]"#, player_response()))
            .create_async()
            .await;

        let (resolver, _) = test_resolver(&server.url());
        let details = resolver.resolve(VIDEO_ID).await.unwrap();

        pbj.assert_async().await;
        assert_eq!(details.title, "Test Video");
        assert_eq!(details.formats.len(), 1);
        // No script URL in the consent page, so the cipher stays unresolved
        assert!(!details.adaptive_formats[0].is_playable());
    }

    #[tokio::test]
    async fn test_extraction_error_when_everything_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex(format!("^v={}$", VIDEO_ID)))
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;
        server
            .mock("GET", Matcher::Regex("^/watch".to_string()))
            .match_query(Matcher::Regex("pbj=1".to_string()))
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let (resolver, _) = test_resolver(&server.url());
        assert!(matches!(
            resolver.resolve(VIDEO_ID).await,
            Err(ResolveError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let (resolver, _) = test_resolver("http://127.0.0.1:9");
        assert!(matches!(
            resolver.resolve("not a video").await,
            Err(ResolveError::InvalidUrl(_))
        ));
    }
}
