//! Admin reports: cooking-time buckets, subscription links and favorites.
//!
//! Cooking-time thresholds come from the current data: the values at one
//! third and two thirds of the sorted cooking times split recipes into fast,
//! medium and long ones.

use crate::domain::{FavoriteCount, SubscriptionFilter, User};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Fast,
    Medium,
    Long,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Fast, Bucket::Medium, Bucket::Long];
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Bucket::Fast),
            "medium" => Ok(Bucket::Medium),
            "long" => Ok(Bucket::Long),
            other => Err(format!("unknown bucket '{other}', expected fast, medium or long")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookingTimeBuckets {
    /// Fast recipes cook in less than `fast_below` minutes.
    pub fast_below: i64,
    /// Long recipes cook in at least `long_from` minutes.
    pub long_from: i64,
}

impl CookingTimeBuckets {
    /// `None` when there are fewer than three recipes to split.
    pub fn from_times(times: &[i64]) -> Option<Self> {
        if times.len() < 3 {
            return None;
        }
        let mut sorted = times.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        Some(Self {
            fast_below: sorted[n / 3],
            long_from: sorted[2 * n / 3],
        })
    }

    pub fn bucket_of(&self, cooking_time: i64) -> Bucket {
        if cooking_time < self.fast_below {
            Bucket::Fast
        } else if cooking_time < self.long_from {
            Bucket::Medium
        } else {
            Bucket::Long
        }
    }

    pub fn counts(&self, times: &[i64]) -> [(Bucket, usize); 3] {
        Bucket::ALL.map(|bucket| {
            (
                bucket,
                times.iter().filter(|t| self.bucket_of(**t) == bucket).count(),
            )
        })
    }

    pub fn label(&self, bucket: Bucket) -> String {
        match bucket {
            Bucket::Fast => format!("faster than {} min", self.fast_below),
            Bucket::Medium => format!("{} to {} min", self.fast_below, self.long_from),
            Bucket::Long => format!("{} min or longer", self.long_from),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Bucket::Fast => "fast",
            Bucket::Medium => "medium",
            Bucket::Long => "long",
        };
        f.write_str(name)
    }
}

impl FromStr for SubscriptionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "has-subscriptions" => Ok(SubscriptionFilter::HasSubscriptions),
            "has-subscribers" => Ok(SubscriptionFilter::HasSubscribers),
            other => Err(format!(
                "unknown filter '{other}', expected has-subscriptions or has-subscribers"
            )),
        }
    }
}

impl fmt::Display for SubscriptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionFilter::HasSubscriptions => "has-subscriptions",
            SubscriptionFilter::HasSubscribers => "has-subscribers",
        };
        f.write_str(name)
    }
}

pub fn user_lines(users: &[User]) -> Vec<String> {
    users
        .iter()
        .map(|user| format!("#{} {} <{}>", user.id, user.username, user.email))
        .collect()
}

/// One line per recipe, most favorited first as returned by storage.
pub fn favorite_lines(counts: &[FavoriteCount]) -> Vec<String> {
    let width = counts.iter().map(|c| c.favorited.to_string().len()).max().unwrap_or(1);
    counts
        .iter()
        .map(|c| format!("{:>width$}  #{} {} by {}", c.favorited, c.recipe_id, c.name, c.author))
        .collect()
}
