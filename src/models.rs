pub mod referrals;
pub mod rewards;
pub mod tokens;
pub mod users;
