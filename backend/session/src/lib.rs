pub mod editor;
pub mod insights;
pub mod render;
pub mod sample;
pub mod session;

pub use editor::{ExportFile, RecordEditor, SaveOutcome, DEFAULT_EXPORT_NAME, EXPORT_CONTENT_TYPE};
pub use insights::{ApplyOutcome, InsightBoard, InsightOutcome};
pub use render::{render_insights, InsightsView, Placeholder, SectionBody, SectionView, TabView};
pub use sample::initial_record;
pub use session::{Session, SessionSnapshot};
