pub mod error;

pub mod config;

pub mod logging;

pub mod cache {
    pub mod data_source;
    pub use data_source::{DataSource, FetchError};

    pub mod lazy_cache;
    pub use lazy_cache::{CacheStatsSnapshot, EntryState, ItemMeta, LazyCache, LoadedItem};
}

pub mod controller {
    pub mod actions;
    pub use actions::{Effect, TreeAction};

    pub mod events;
    pub use events::{EventQueue, TreeEvent};

    pub mod navigation;
    pub use navigation::{Modifiers, NavCommand, NavigationState};

    pub mod reorder;
    pub use reorder::{MovePermission, MoveRequest, ReorderEngine};

    pub mod tree_view;
    pub use tree_view::{TreeView, TreeViewBuilder};
}

pub mod model {
    pub mod item;
    pub use item::{ChildrenCount, DefaultAccessor, FnAccessor, ItemAccessor, NodeId, TreeItem};

    pub mod tree_index;
    pub use tree_index::{TreeIndex, ViewFilter};

    pub mod ownership;
    pub use ownership::{IdSet, Ownership};

    pub mod expansion;
    pub use expansion::ExpansionStore;

    pub mod selection;
    pub use selection::{Propagation, SelectionMode, SelectionStore};
}

pub mod util {
    pub mod clock;
    pub use clock::{Clock, ManualClock, SystemClock};
}

pub use config::TreeConfig;

pub use controller::{TreeAction, TreeEvent, TreeView};

pub use error::{TreeError, TreeResult};

pub use model::{NodeId, TreeItem};
