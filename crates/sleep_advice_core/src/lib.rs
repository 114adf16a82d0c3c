pub mod domain;
pub mod ports;
pub mod prompt;
pub mod protocol;

pub use domain::{DailySleep, SleepSample, WeeklyStats, STATS_WINDOW_DAYS};
pub use ports::{
    AdviceGenerationService, FragmentStream, GenerationOptions, PortError, PortResult,
    SleepStatsService,
};
pub use prompt::advice_prompt;
pub use protocol::{AdviceBody, ApiResponse, StreamEvent};
