//! Engine configuration
//!
//! Every timing constant, name table and size used by the core lives here
//! so behaviour can be tuned per deployment and per asset without touching
//! the components.

use std::time::Duration;

use crate::model::Avatar;
use crate::model::AuthContext;
use crate::model::Signal;
use crate::model::StateKind;

/// Asset shown on the sign-in pages.
pub const DEFAULT_UNAUTHENTICATED_ASSET: &str = "/static/Asistente_masculino.riv";
/// Asset shown once the user is signed in.
pub const DEFAULT_AUTHENTICATED_ASSET: &str = "/static/Asistente_femenino.riv";
/// State machine requested from both assets.
pub const DEFAULT_STATE_MACHINE: &str = "State Machine 1";

/// Retry schedule for waits on something that becomes available later.
///
/// The delay starts at `initial_delay` and is multiplied by `multiplier`
/// after every attempt, never exceeding `max_delay`. A multiplier of 1
/// gives a fixed interval.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use avatar_sync::config::Backoff;
///
/// let fixed = Backoff::fixed(Duration::from_secs(1), 5);
/// assert_eq!(fixed.delay_for(3), Duration::from_secs(1));
///
/// let exp = Backoff::exponential(Duration::from_millis(100), Duration::from_millis(800), 8);
/// assert_eq!(exp.delay_for(2), Duration::from_millis(400));
/// assert_eq!(exp.delay_for(6), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// Maximum number of waits. `None` retries until the caller gives up.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: u32,
}

impl Backoff {
    /// A fixed interval with a bounded number of attempts.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1,
        }
    }

    /// A fixed interval without an attempt bound.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            max_attempts: None,
            initial_delay: interval,
            max_delay: interval,
            multiplier: 1,
        }
    }

    /// Doubling delays capped at `max_delay`.
    pub fn exponential(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay,
            max_delay,
            multiplier: 2,
        }
    }

    /// Delay to wait before retry number `attempt` (zero based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns `true` if another wait is allowed after `attempt` waits.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// Accepted input names per semantic signal, matched case-insensitively in
/// declaration order.
#[derive(Debug, Clone)]
pub struct InputAliases {
    pub message: Vec<String>,
    pub no_permission: Vec<String>,
    pub error: Vec<String>,
    pub listening: Vec<String>,
    pub attention: Vec<String>,
    pub hover: Vec<String>,
}

impl Default for InputAliases {
    fn default() -> Self {
        Self {
            message: names(&["Mensaje", "message"]),
            no_permission: names(&["Sin_Permiso", "Sin Permiso", "no_permission"]),
            error: names(&["ERROR"]),
            listening: names(&["Escuchando", "listening"]),
            attention: names(&["atencion", "atención"]),
            hover: names(&[
                "Hover",
                "IsHover",
                "Atencion",
                "Atención",
                "Atencion_Estado",
                "Estado_Atencion",
            ]),
        }
    }
}

impl InputAliases {
    /// Aliases for a signal.
    pub fn for_signal(&self, signal: Signal) -> &[String] {
        match signal {
            Signal::Message => &self.message,
            Signal::NoPermission => &self.no_permission,
            Signal::Error => &self.error,
            Signal::Listening => &self.listening,
            Signal::Attention => &self.attention,
            Signal::Hover => &self.hover,
        }
    }
}

/// Candidate text-run names per state, tried in order until a write
/// succeeds.
#[derive(Debug, Clone)]
pub struct TextSlots {
    pub message: Vec<String>,
    pub no_permission: Vec<String>,
    pub error: Vec<String>,
}

impl Default for TextSlots {
    fn default() -> Self {
        let message = names(&["Texto_mensaje", "Texto Mensaje", "Mensaje", "Message"]);
        let mut no_permission = names(&["Texto_sin_permiso"]);
        no_permission.extend(message.iter().cloned());
        Self {
            message,
            no_permission,
            error: names(&["Mensaje_error", "Mensaje Error", "Error"]),
        }
    }
}

impl TextSlots {
    /// Candidates for a state. Listening carries no text.
    pub fn for_kind(&self, kind: StateKind) -> &[String] {
        match kind {
            StateKind::Message => &self.message,
            StateKind::NoPermission => &self.no_permission,
            StateKind::Error => &self.error,
            StateKind::Listening => &[],
        }
    }
}

/// Everything the core needs to know about the animation assets.
#[derive(Debug, Clone)]
pub struct AssetProfile {
    pub unauthenticated_path: String,
    pub authenticated_path: String,
    pub state_machine: String,
    pub inputs: InputAliases,
    pub text_slots: TextSlots,
}

impl Default for AssetProfile {
    fn default() -> Self {
        Self {
            unauthenticated_path: DEFAULT_UNAUTHENTICATED_ASSET.to_string(),
            authenticated_path: DEFAULT_AUTHENTICATED_ASSET.to_string(),
            state_machine: DEFAULT_STATE_MACHINE.to_string(),
            inputs: InputAliases::default(),
            text_slots: TextSlots::default(),
        }
    }
}

impl AssetProfile {
    /// Asset path for an auth context.
    pub fn path_for(&self, auth: AuthContext) -> &str {
        match auth {
            AuthContext::Authenticated => &self.authenticated_path,
            AuthContext::Unauthenticated => &self.unauthenticated_path,
        }
    }
}

/// Maximum display sizes, in pixels, per avatar and auth context.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryConfig {
    pub button_unauthenticated: f32,
    pub button_authenticated: f32,
    pub panel_unauthenticated: f32,
    pub panel_authenticated: f32,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            button_unauthenticated: 312.0,
            button_authenticated: 312.0,
            panel_unauthenticated: 270.0,
            panel_authenticated: 288.0,
        }
    }
}

impl GeometryConfig {
    pub fn max_size(&self, avatar: Avatar, auth: AuthContext) -> f32 {
        match (avatar, auth) {
            (Avatar::Button, AuthContext::Unauthenticated) => self.button_unauthenticated,
            (Avatar::Button, AuthContext::Authenticated) => self.button_authenticated,
            (Avatar::Panel, AuthContext::Unauthenticated) => self.panel_unauthenticated,
            (Avatar::Panel, AuthContext::Authenticated) => self.panel_authenticated,
        }
    }
}

/// Timing and retry policy of the state arbiter.
#[derive(Debug, Clone)]
pub struct ArbiterConfig {
    /// Time a completed write keeps its lane busy before the next request.
    ///
    /// Default: 1.5 seconds
    pub settle_delay: Duration,
    /// Delay after which an error shown with text is cleared.
    ///
    /// Default: 5 seconds
    pub error_revert_after: Duration,
    /// Readiness wait for the floating button.
    ///
    /// Default: every second, unbounded
    pub button_readiness: Backoff,
    /// Readiness wait for the panel avatar.
    ///
    /// Default: every second, 5 attempts
    pub panel_readiness: Backoff,
    /// Message texts that may reach the avatars while the panel is open.
    pub panel_allow_list: Vec<String>,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1500),
            error_revert_after: Duration::from_secs(5),
            button_readiness: Backoff::unbounded(Duration::from_secs(1)),
            panel_readiness: Backoff::fixed(Duration::from_secs(1), 5),
            panel_allow_list: names(&[
                "Selecciona el tipo de mensaje",
                "Mensaje enviado",
                "Se te responderá",
                "El equipo del laboratorio recibirá tu mensaje",
                "Muchas Gracias",
            ]),
        }
    }
}

impl ArbiterConfig {
    pub fn readiness(&self, avatar: Avatar) -> &Backoff {
        match avatar {
            Avatar::Button => &self.button_readiness,
            Avatar::Panel => &self.panel_readiness,
        }
    }

    /// Returns `true` if the text belongs to the panel's own messaging.
    pub fn is_panel_message(&self, text: &str) -> bool {
        self.panel_allow_list.iter().any(|phrase| text.contains(phrase.as_str()))
    }
}

/// Event bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Event name that opens the chat panel, compared case-insensitively.
    pub open_panel_event: String,
    /// Minimum time between two forwarded open-panel requests.
    ///
    /// Default: 1500 ms
    pub cooldown: Duration,
    /// Sampling interval of the attention flag used by pointer taps.
    ///
    /// Default: 50 ms
    pub attention_sample_interval: Duration,
    /// Words that mark an active state as an attention/hover state.
    pub attention_states: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            open_panel_event: "AbrirPanel".to_string(),
            cooldown: Duration::from_millis(1500),
            attention_sample_interval: Duration::from_millis(50),
            attention_states: names(&["atencion", "atención", "hover", "attention"]),
        }
    }
}

/// Flash-message reconciler settings.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Delay after which a mapped notification is reverted.
    ///
    /// Default: 5 seconds
    pub revert_after: Duration,
    /// Text used when the welcome notification has none.
    pub welcome_fallback: String,
    /// Phrases that identify sign-in failures on unauthenticated pages.
    pub login_failure_keywords: Vec<String>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            revert_after: Duration::from_secs(5),
            welcome_fallback: "¡Bienvenido!".to_string(),
            login_failure_keywords: names(&["incorrecta", "no encontrado", "inactivo", "contraseña", "permiso"]),
        }
    }
}

/// Top-level configuration of an [`AvatarContext`](crate::AvatarContext).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use avatar_sync::config::AvatarConfig;
/// use avatar_sync::model::AuthContext;
///
/// let config = AvatarConfig::new(AuthContext::Authenticated)
///     .with_settle_delay(Duration::from_millis(500));
/// assert!(config.auth.is_authenticated());
/// ```
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    /// Read-only auth flag of the surrounding page.
    pub auth: AuthContext,
    pub asset: AssetProfile,
    pub geometry: GeometryConfig,
    pub arbiter: ArbiterConfig,
    pub bridge: BridgeConfig,
    pub reconciler: ReconcilerConfig,
    /// Input resolution schedule after an asset loads.
    ///
    /// Default: 100 ms doubling to 800 ms, 8 attempts
    pub input_resolution: Backoff,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self::new(AuthContext::default())
    }
}

impl AvatarConfig {
    /// Creates a config with default values for the given auth context.
    pub fn new(auth: AuthContext) -> Self {
        Self {
            auth,
            asset: AssetProfile::default(),
            geometry: GeometryConfig::default(),
            arbiter: ArbiterConfig::default(),
            bridge: BridgeConfig::default(),
            reconciler: ReconcilerConfig::default(),
            input_resolution: Backoff::exponential(Duration::from_millis(100), Duration::from_millis(800), 8),
        }
    }

    pub fn with_asset(mut self, asset: AssetProfile) -> Self {
        self.asset = asset;
        self
    }

    pub fn with_geometry(mut self, geometry: GeometryConfig) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_arbiter(mut self, arbiter: ArbiterConfig) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_bridge(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_reconciler(mut self, reconciler: ReconcilerConfig) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_input_resolution(mut self, backoff: Backoff) -> Self {
        self.input_resolution = backoff;
        self
    }

    /// Sets the arbiter's settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.arbiter.settle_delay = delay;
        self
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
