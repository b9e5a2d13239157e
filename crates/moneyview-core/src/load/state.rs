/// Lifecycle of one cached resource.
///
/// Values are kept outside the state so transitions stay a pure state
/// machine. States rank in three tiers, `Idle < Loading < Ready | Error`,
/// with `Ready` and `Error` sharing the settled tier. No `Ord` is derived,
/// since declaration order would put `Error` above `Ready`; compare with
/// [`LoadState::tier`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl LoadState {
    /// Rank used by the transition guards: 0 idle, 1 loading, 2 settled.
    pub fn tier(&self) -> u8 {
        match self {
            LoadState::Idle => 0,
            LoadState::Loading => 1,
            LoadState::Ready | LoadState::Error => 2,
        }
    }

    /// `Ready` or `Error`.
    pub fn is_settled(&self) -> bool {
        self.tier() == 2
    }

    /// `Idle -> Loading`.
    pub fn begin_load(&mut self) -> bool {
        if *self != LoadState::Idle {
            return false;
        }
        *self = LoadState::Loading;
        true
    }

    /// `Ready | Error -> Loading`; `Loading` doubles as the busy marker during teardown.
    pub fn begin_unload(&mut self) -> bool {
        if !self.is_settled() {
            return false;
        }
        *self = LoadState::Loading;
        true
    }

    /// Anything but `Loading` -> `Loading`, for explicit refresh.
    pub fn begin_reload(&mut self) -> bool {
        if *self == LoadState::Loading {
            return false;
        }
        *self = LoadState::Loading;
        true
    }

    /// `Loading -> Ready` when `ok`, else `Loading -> Error`. No-op otherwise.
    pub fn finish_load(&mut self, ok: bool) {
        if *self != LoadState::Loading {
            return;
        }
        *self = if ok { LoadState::Ready } else { LoadState::Error };
    }

    /// `Loading -> Idle`. No-op otherwise.
    pub fn finish_unload(&mut self) {
        if *self != LoadState::Loading {
            return;
        }
        *self = LoadState::Idle;
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Error => "error",
        }
    }
}
