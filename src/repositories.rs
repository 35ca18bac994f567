pub mod cache;
pub mod referrals;
pub mod rewards;
pub mod users;
