use hashbrown::HashMap;

/// Parent key → child keys, in insertion order.
pub type VecIndex<K, V> = HashMap<K, Vec<V>>;

/// Appends `child` under `parent` unless it is already present.
pub fn link<K, V>(index: &mut VecIndex<K, V>, parent: K, child: V)
where
    K: Eq + std::hash::Hash,
    V: PartialEq,
{
    let children = index.entry(parent).or_default();
    if !children.contains(&child) {
        children.push(child);
    }
}
