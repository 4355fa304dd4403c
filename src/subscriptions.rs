use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::models::{ChannelRef, ProductKey, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Added,
    AlreadyTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrackOutcome {
    Removed,
    NotTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOutcome {
    Set,
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    NotSet,
}

/// One user's watch state: what they track, what they auto-buy, where alerts
/// go.
#[derive(Debug, Default, Clone)]
pub struct UserSubscription {
    tracking: HashSet<ProductKey>,
    buylist: HashMap<ProductKey, Decimal>,
    channel: Option<ChannelRef>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserSubscription>,
    // Reverse index for poll fan-out; updated under the same write lock as
    // the forward map so the two can never disagree.
    watchers: HashMap<ProductKey, HashSet<UserId>>,
}

/// In-memory registry of every user's subscriptions. All mutations are
/// single-key, last-writer-wins, and take exactly one write-lock critical
/// section. Nothing outside this type holds a mutable reference to a
/// subscription.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: RwLock<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn track(&self, user: UserId, key: ProductKey) -> TrackOutcome {
        let mut inner = self.inner.write().await;
        let subscription = inner.users.entry(user).or_default();
        if !subscription.tracking.insert(key.clone()) {
            return TrackOutcome::AlreadyTracked;
        }
        inner.watchers.entry(key).or_default().insert(user);
        TrackOutcome::Added
    }

    pub async fn untrack(&self, user: UserId, key: &ProductKey) -> UntrackOutcome {
        let mut inner = self.inner.write().await;
        let removed = inner
            .users
            .get_mut(&user)
            .map(|s| s.tracking.remove(key))
            .unwrap_or(false);
        if !removed {
            return UntrackOutcome::NotTracked;
        }
        let now_empty = inner
            .watchers
            .get_mut(key)
            .map(|watchers| {
                watchers.remove(&user);
                watchers.is_empty()
            })
            .unwrap_or(false);
        if now_empty {
            inner.watchers.remove(key);
        }
        UntrackOutcome::Removed
    }

    pub async fn set_buy_threshold(
        &self,
        user: UserId,
        key: ProductKey,
        price: Decimal,
    ) -> ThresholdOutcome {
        let mut inner = self.inner.write().await;
        let subscription = inner.users.entry(user).or_default();
        match subscription.buylist.insert(key, price) {
            Some(_) => ThresholdOutcome::Replaced,
            None => ThresholdOutcome::Set,
        }
    }

    pub async fn clear_buy_threshold(&self, user: UserId, key: &ProductKey) -> ClearOutcome {
        let mut inner = self.inner.write().await;
        let cleared = inner
            .users
            .get_mut(&user)
            .map(|s| s.buylist.remove(key).is_some())
            .unwrap_or(false);
        if cleared {
            ClearOutcome::Cleared
        } else {
            ClearOutcome::NotSet
        }
    }

    pub async fn set_channel(&self, user: UserId, channel: ChannelRef) {
        let mut inner = self.inner.write().await;
        inner.users.entry(user).or_default().channel = Some(channel);
    }

    pub async fn channel(&self, user: UserId) -> Option<ChannelRef> {
        let inner = self.inner.read().await;
        inner.users.get(&user).and_then(|s| s.channel)
    }

    /// Snapshot of one user's tracked keys.
    pub async fn tracking_list(&self, user: UserId) -> Vec<ProductKey> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ProductKey> = inner
            .users
            .get(&user)
            .map(|s| s.tracking.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        keys
    }

    /// Snapshot of one user's buylist with thresholds.
    pub async fn buylist(&self, user: UserId) -> Vec<(ProductKey, Decimal)> {
        let inner = self.inner.read().await;
        let mut entries: Vec<(ProductKey, Decimal)> = inner
            .users
            .get(&user)
            .map(|s| s.buylist.iter().map(|(k, p)| (k.clone(), *p)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.to_string().cmp(&b.0.to_string()));
        entries
    }

    pub async fn buy_threshold(&self, user: UserId, key: &ProductKey) -> Option<Decimal> {
        let inner = self.inner.read().await;
        inner.users.get(&user).and_then(|s| s.buylist.get(key).copied())
    }

    /// Users tracking a given key, for event fan-out.
    pub async fn watchers(&self, key: &ProductKey) -> Vec<UserId> {
        let inner = self.inner.read().await;
        inner
            .watchers
            .get(key)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every key with at least one watcher; the poller's work list.
    pub async fn tracked_keys(&self) -> Vec<ProductKey> {
        let inner = self.inner.read().await;
        inner.watchers.keys().cloned().collect()
    }
}
