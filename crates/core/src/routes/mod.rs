use std::{
    collections::HashMap,
    sync::{Arc, atomic::AtomicU64},
};

use crate::{events::EnrichedEvent, queues::IsolatedForwarder};

pub struct Routes {
    pub table: HashMap<&'static str, Vec<Route>>,
}

pub struct Route {
    pub subscriber_id: &'static str,
    pub inbox: IsolatedForwarder<Arc<EnrichedEvent>>,
    pub drops_total: Arc<AtomicU64>,
}

impl Route {
    /// `false` once the subscriber has gone away.
    pub fn try_deliver(&self, event: Arc<EnrichedEvent>) -> bool {
        self.inbox.try_send(event).is_ok()
    }
}
