/// Current UTC time without offset, matching the `TIMESTAMP` columns.
pub fn utc_now() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}
