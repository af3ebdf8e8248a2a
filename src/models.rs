mod classification;
mod note;

pub use classification::{Category, ChatMessage, Classification, Role};
pub use note::{
    DailyLog, ListOptions, NewNote, NewNoteBuilder, Note, NoteRef, NoteSummary, NoteUpdate,
    SortBy, UpdateOutcome,
};
