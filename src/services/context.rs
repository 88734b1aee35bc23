/// The calling principal, as resolved by the authentication layer.
pub trait UserContext: Send + Sync {
    fn person_id(&self) -> Option<i64>;

    fn company_id(&self) -> Option<i64>;

    fn is_admin(&self) -> bool;
}
