//! Owned engine-side values.
//!
//! A [`Slot`] is a `VALUE` that owns its payload. Heap payloads are
//! `Arc` allocations whose raw pointer lives in `VALUE::d`; cloning a slot
//! bumps the reference count and dropping it releases one reference.
//! Arrays and maps are copy-on-write, script objects are shared by reference.

use parking_lot::Mutex;
use sciter_sys::*;
use std::sync::Arc;

/// UTF-16 code units followed by a terminating zero.
pub(crate) type Text = Vec<u16>;
pub(crate) type Bytes = Vec<u8>;
pub(crate) type Items = Vec<Slot>;
pub(crate) type Pairs = Vec<(Slot, Slot)>;

/// Host function exposed to the engine as a script function.
pub type ScriptFn = Arc<dyn Fn(&[VALUE]) -> Result<VALUE, ScriptFailure> + Send + Sync>;

/// How a script function failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    /// The script threw (or returned) an error object. The call itself succeeds.
    Thrown(String),
    /// The engine detected an error while running the script.
    Failed(String),
}

/// A native functor stored by `ValueNativeFunctorSet`.
pub(crate) struct Functor {
    pub(crate) invoke: NATIVE_FUNCTOR_INVOKE,
    pub(crate) release: Option<NATIVE_FUNCTOR_RELEASE>,
    pub(crate) tag: LPVOID,
}

// SAFETY: the tag is owned by whoever registered the functor; the engine only
// hands it back to the registered trampolines.
unsafe impl Send for Functor {}
unsafe impl Sync for Functor {}

impl Drop for Functor {
    fn drop(&mut self) {
        if let Some(release) = self.release {
            // SAFETY: release was supplied together with tag and is called once
            unsafe { release(self.tag) };
        }
    }
}

pub(crate) enum ObjectBody {
    Array(Items),
    Map(Pairs),
    Function(ScriptFn),
}

/// A live script object. Every copy of the value sees the same body.
pub(crate) struct ScriptObject {
    pub(crate) body: Mutex<ObjectBody>,
}

#[repr(transparent)]
pub(crate) struct Slot(pub(crate) VALUE);

fn is_heap(t: UINT) -> bool {
    matches!(t, T_STRING | T_BYTES | T_ARRAY | T_MAP | T_FUNCTION | T_OBJECT)
}

fn into_payload<T>(payload: Arc<T>) -> u64 {
    Arc::into_raw(payload) as usize as u64
}

/// # Safety
/// `d` must come from `into_payload::<T>` and still hold a reference.
unsafe fn payload_ref<'a, T>(d: u64) -> &'a T {
    unsafe { &*(d as usize as *const T) }
}

impl Slot {
    pub(crate) const fn undefined() -> Self {
        Self(VALUE {
            t: T_UNDEFINED,
            u: 0,
            d: 0,
        })
    }

    pub(crate) fn scalar(t: UINT, u: UINT, d: u64) -> Self {
        Self(VALUE { t, u, d })
    }

    pub(crate) fn int(t: UINT, u: UINT, v: i32) -> Self {
        Self::scalar(t, u, v as i64 as u64)
    }

    pub(crate) fn float(t: UINT, u: UINT, v: f64) -> Self {
        Self::scalar(t, u, v.to_bits())
    }

    pub(crate) fn bool(v: bool) -> Self {
        Self::scalar(T_BOOL, 0, v as u64)
    }

    pub(crate) fn text(units: UINT, chars: &[u16]) -> Self {
        let mut buf = Vec::with_capacity(chars.len() + 1);
        buf.extend_from_slice(chars);
        buf.push(0);
        Self::scalar(T_STRING, units, into_payload(Arc::new(buf)))
    }

    pub(crate) fn string(units: UINT, s: &str) -> Self {
        let chars: Vec<u16> = s.encode_utf16().collect();
        Self::text(units, &chars)
    }

    pub(crate) fn bytes(data: &[u8]) -> Self {
        Self::scalar(T_BYTES, 0, into_payload(Arc::new(data.to_vec())))
    }

    pub(crate) fn array(items: Items) -> Self {
        Self::scalar(T_ARRAY, 0, into_payload(Arc::new(items)))
    }

    pub(crate) fn map(pairs: Pairs) -> Self {
        Self::scalar(T_MAP, 0, into_payload(Arc::new(pairs)))
    }

    pub(crate) fn functor(functor: Functor) -> Self {
        Self::scalar(T_FUNCTION, 0, into_payload(Arc::new(functor)))
    }

    pub(crate) fn object(units: UINT, body: ObjectBody) -> Self {
        let object = ScriptObject {
            body: Mutex::new(body),
        };
        Self::scalar(T_OBJECT, units, into_payload(Arc::new(object)))
    }

    /// Borrow a caller-owned value.
    ///
    /// # Safety
    /// `p` must be null or point to an initialized `VALUE`.
    pub(crate) unsafe fn from_ptr<'a>(p: *const VALUE) -> Option<&'a Slot> {
        unsafe { (p as *const Slot).as_ref() }
    }

    /// # Safety
    /// `p` must be null or point to an initialized `VALUE`.
    pub(crate) unsafe fn from_mut_ptr<'a>(p: *mut VALUE) -> Option<&'a mut Slot> {
        unsafe { (p as *mut Slot).as_mut() }
    }

    /// Take ownership of a raw value.
    ///
    /// # Safety
    /// `v` must be an initialized value produced by this engine that nobody
    /// else is going to release.
    pub(crate) unsafe fn from_raw(v: VALUE) -> Self {
        Self(v)
    }

    pub(crate) fn vt(&self) -> UINT {
        self.0.t
    }

    pub(crate) fn units(&self) -> UINT {
        self.0.u
    }

    pub(crate) fn as_int(&self) -> i32 {
        self.0.d as i64 as i32
    }

    pub(crate) fn as_i64(&self) -> i64 {
        self.0.d as i64
    }

    pub(crate) fn as_f64(&self) -> f64 {
        f64::from_bits(self.0.d)
    }

    pub(crate) fn text_ref(&self) -> Option<&Text> {
        (self.0.t == T_STRING && self.0.d != 0).then(|| unsafe { payload_ref::<Text>(self.0.d) })
    }

    /// Text without the terminating zero.
    pub(crate) fn chars(&self) -> Option<&[u16]> {
        self.text_ref().map(|t| &t[..t.len() - 1])
    }

    pub(crate) fn to_rust_string(&self) -> Option<String> {
        self.chars().map(String::from_utf16_lossy)
    }

    pub(crate) fn bytes_ref(&self) -> Option<&Bytes> {
        (self.0.t == T_BYTES && self.0.d != 0).then(|| unsafe { payload_ref::<Bytes>(self.0.d) })
    }

    pub(crate) fn items(&self) -> Option<&Items> {
        (self.0.t == T_ARRAY && self.0.d != 0).then(|| unsafe { payload_ref::<Items>(self.0.d) })
    }

    pub(crate) fn pairs(&self) -> Option<&Pairs> {
        (self.0.t == T_MAP && self.0.d != 0).then(|| unsafe { payload_ref::<Pairs>(self.0.d) })
    }

    pub(crate) fn functor_ref(&self) -> Option<&Functor> {
        (self.0.t == T_FUNCTION && self.0.d != 0)
            .then(|| unsafe { payload_ref::<Functor>(self.0.d) })
    }

    pub(crate) fn object_ref(&self) -> Option<&ScriptObject> {
        (self.0.t == T_OBJECT && self.0.d != 0)
            .then(|| unsafe { payload_ref::<ScriptObject>(self.0.d) })
    }

    /// Mutable access to array items, unsharing them first.
    pub(crate) fn items_mut<R>(&mut self, f: impl FnOnce(&mut Items) -> R) -> Option<R> {
        if self.0.t != T_ARRAY || self.0.d == 0 {
            return None;
        }
        // SAFETY: T_ARRAY payloads are always Arc<Items>
        let mut payload = unsafe { Arc::from_raw(self.0.d as usize as *const Items) };
        let result = f(Arc::make_mut(&mut payload));
        self.0.d = into_payload(payload);
        Some(result)
    }

    /// Mutable access to map pairs, unsharing them first.
    pub(crate) fn pairs_mut<R>(&mut self, f: impl FnOnce(&mut Pairs) -> R) -> Option<R> {
        if self.0.t != T_MAP || self.0.d == 0 {
            return None;
        }
        // SAFETY: T_MAP payloads are always Arc<Pairs>
        let mut payload = unsafe { Arc::from_raw(self.0.d as usize as *const Pairs) };
        let result = f(Arc::make_mut(&mut payload));
        self.0.d = into_payload(payload);
        Some(result)
    }
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        let VALUE { t, d, .. } = self.0;
        if is_heap(t) && d != 0 {
            let ptr = d as usize;
            // SAFETY: heap payloads were created by Arc::into_raw with the type
            // matching `t`
            unsafe {
                match t {
                    T_STRING => Arc::increment_strong_count(ptr as *const Text),
                    T_BYTES => Arc::increment_strong_count(ptr as *const Bytes),
                    T_ARRAY => Arc::increment_strong_count(ptr as *const Items),
                    T_MAP => Arc::increment_strong_count(ptr as *const Pairs),
                    T_FUNCTION => Arc::increment_strong_count(ptr as *const Functor),
                    T_OBJECT => Arc::increment_strong_count(ptr as *const ScriptObject),
                    _ => {}
                }
            }
        }
        Self(self.0)
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let VALUE { t, d, .. } = self.0;
        self.0 = VALUE::default();
        if !is_heap(t) || d == 0 {
            return;
        }
        let ptr = d as usize;
        // SAFETY: see Clone; this releases exactly the reference we own
        unsafe {
            match t {
                T_STRING => drop(Arc::from_raw(ptr as *const Text)),
                T_BYTES => drop(Arc::from_raw(ptr as *const Bytes)),
                T_ARRAY => drop(Arc::from_raw(ptr as *const Items)),
                T_MAP => drop(Arc::from_raw(ptr as *const Pairs)),
                T_FUNCTION => drop(Arc::from_raw(ptr as *const Functor)),
                T_OBJECT => drop(Arc::from_raw(ptr as *const ScriptObject)),
                _ => {}
            }
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        if self.0.t != other.0.t || self.0.u != other.0.u {
            return false;
        }
        match self.0.t {
            T_UNDEFINED | T_NULL => true,
            T_STRING => self.chars() == other.chars(),
            T_BYTES => self.bytes_ref() == other.bytes_ref(),
            T_ARRAY => self.items() == other.items(),
            T_MAP => match (self.pairs(), other.pairs()) {
                (Some(a), Some(b)) => pairs_equal(a, b),
                (a, b) => a.is_none() && b.is_none(),
            },
            T_FLOAT | T_LENGTH | T_DURATION | T_ANGLE => self.as_f64() == other.as_f64(),
            // functions and objects compare by identity, scalars by payload
            _ => self.0.d == other.0.d,
        }
    }
}

/// Map equality ignores entry order.
pub(crate) fn pairs_equal(a: &Pairs, b: &Pairs) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.iter()
                .find(|(other_key, _)| other_key == key)
                .is_some_and(|(_, other_value)| other_value == value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_payload() {
        let a = Slot::string(UT_STRING_STRING, "hello");
        let b = a.clone();
        assert_eq!(a.0.d, b.0.d);
        assert_eq!(b.to_rust_string().as_deref(), Some("hello"));
        drop(a);
        assert_eq!(b.to_rust_string().as_deref(), Some("hello"));
    }

    #[test]
    fn test_array_copy_on_write() {
        let mut a = Slot::array(vec![Slot::int(T_INT, 0, 1), Slot::int(T_INT, 0, 2)]);
        let b = a.clone();
        a.items_mut(|items| items[0] = Slot::int(T_INT, 0, 7)).unwrap();
        assert_eq!(a.items().unwrap()[0].as_int(), 7);
        assert_eq!(b.items().unwrap()[0].as_int(), 1);
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let one = Slot::string(0, "one");
        let two = Slot::string(0, "two");
        let a = Slot::map(vec![
            (one.clone(), Slot::int(T_INT, 0, 1)),
            (two.clone(), Slot::int(T_INT, 0, 2)),
        ]);
        let b = Slot::map(vec![
            (two, Slot::int(T_INT, 0, 2)),
            (one, Slot::int(T_INT, 0, 1)),
        ]);
        assert!(a == b);
    }

    #[test]
    fn test_scalar_equality_checks_units() {
        let px = Slot::float(T_LENGTH, UT_PX, 10.0);
        let em = Slot::float(T_LENGTH, UT_EM, 10.0);
        assert!(px != em);
        assert!(px == Slot::float(T_LENGTH, UT_PX, 10.0));
    }
}
