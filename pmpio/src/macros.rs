/// Generates `write_<name>` helpers for each writable register on `PmpBridgeExt`.
#[macro_export]
macro_rules! pmp_impl_register_rw {
    ($($name:ident => $reg:ident),+ $(,)?) => {
        $(
            paste::paste! {
                #[inline(always)]
                fn [<write_ $name>](&mut self, value: u8) -> BridgeResult {
                    self.write_register($crate::Register::$reg, value)
                }
            }
        )+
    };
}
