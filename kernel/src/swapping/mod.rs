use crate::{
    error::{Result, VmError},
    mem::Frame,
};
use alloc::{boxed::Box, vec};
use log::{debug, trace};
use mokernel_shared::mem::{page_base, PAGE_FRAME_SIZE};

/// Backing store for pages that are not resident, kept in kernel memory.
///
/// Each slot holds one page's worth of bytes and is keyed by the page aligned
/// virtual address it belongs to. Any address inside a page refers to the same
/// slot. A page occupies at most one slot: writing a page that already has a
/// slot overwrites it in place.
pub struct SwapStore {
    area: Box<[Frame]>,
    // Page base owning each slot, `None` while the slot is free.
    slots: Box<[Option<usize>]>,
}

impl SwapStore {
    pub fn new(slots: usize) -> Self {
        debug!(
            "swap store with {slots} slots ({} bytes)",
            slots * PAGE_FRAME_SIZE
        );
        Self {
            area: vec![[0; PAGE_FRAME_SIZE]; slots].into_boxed_slice(),
            slots: vec![None; slots].into_boxed_slice(),
        }
    }

    fn find(&self, address: usize) -> Option<usize> {
        let page = page_base(address);
        self.slots.iter().position(|slot| *slot == Some(page))
    }

    /// Existing slot for the page, or a newly claimed free one.
    fn find_or_claim(&mut self, address: usize) -> Result<usize> {
        let page = page_base(address);
        if let Some(index) = self.find(page) {
            return Ok(index);
        }

        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(VmError::SwapStoreExhausted { page })?;
        self.slots[index] = Some(page);
        trace!("swap slot {index} claimed by {page:#010X}");
        Ok(index)
    }

    pub fn exists(&self, address: usize) -> bool {
        self.find(address).is_some()
    }

    /// The stored contents of the page containing `address`.
    pub fn slot(&self, address: usize) -> Option<&Frame> {
        self.find(address).map(|index| &self.area[index])
    }

    /// Copies the stored page into `frame`. The slot stays occupied.
    ///
    /// # Errors
    ///
    /// [`VmError::SwapMiss`] if no slot holds the page. `frame` is not
    /// touched in that case.
    pub fn read_into(&self, address: usize, frame: &mut Frame) -> Result<()> {
        let index = self.find(address).ok_or(VmError::SwapMiss { address })?;
        frame.copy_from_slice(&self.area[index]);
        trace!("swap slot {index} read for {:#010X}", page_base(address));
        Ok(())
    }

    /// Stores a whole page, overwriting the page's slot if it has one.
    ///
    /// # Errors
    ///
    /// [`VmError::SwapStoreExhausted`] if the page has no slot and none is
    /// free. Nothing is written in that case.
    pub fn write(&mut self, address: usize, frame: &Frame) -> Result<()> {
        let index = self.find_or_claim(address)?;
        self.area[index].copy_from_slice(frame);
        Ok(())
    }

    /// Stores `data` as the start of the page, zero filling the rest. Anything
    /// past one page is dropped.
    ///
    /// # Errors
    ///
    /// Same as [`SwapStore::write`].
    pub fn seed(&mut self, address: usize, data: &[u8]) -> Result<()> {
        let index = self.find_or_claim(address)?;
        let len = data.len().min(PAGE_FRAME_SIZE);
        let slot = &mut self.area[index];
        slot[..len].copy_from_slice(&data[..len]);
        slot[len..].fill(0);
        Ok(())
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_then_read_back() {
        let mut swap = SwapStore::new(4);
        swap.seed(0x0050_0000, b"HELLO").unwrap();

        let mut frame = [0xFF; PAGE_FRAME_SIZE];
        swap.read_into(0x0050_0000, &mut frame).unwrap();
        assert_eq!(&frame[..5], b"HELLO");
        assert!(frame[5..].iter().all(|b| *b == 0));
        // Reading does not consume the slot.
        assert!(swap.exists(0x0050_0000));
    }

    #[test]
    fn test_write_then_read_into_restores_the_page() {
        let mut swap = SwapStore::new(4);
        let mut contents = [0; PAGE_FRAME_SIZE];
        for (i, byte) in contents.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        swap.write(0x0050_0000, &contents).unwrap();
        swap.write(0x0050_1000, &[0xEE; PAGE_FRAME_SIZE]).unwrap();

        let mut frame = [0; PAGE_FRAME_SIZE];
        swap.read_into(0x0050_0000, &mut frame).unwrap();
        assert_eq!(frame, contents);
        swap.read_into(0x0050_1000, &mut frame).unwrap();
        assert!(frame.iter().all(|b| *b == 0xEE));
    }

    #[test]
    fn test_any_address_in_page_names_the_same_slot() {
        let mut swap = SwapStore::new(4);
        swap.seed(0x0050_0123, b"x").unwrap();
        assert!(swap.exists(0x0050_0000));
        assert!(swap.exists(0x0050_0FFF));
        assert!(!swap.exists(0x0050_1000));
        assert_eq!(swap.slot(0x0050_0ABC).unwrap()[0], b'x');
    }

    #[test]
    fn test_rewrite_reuses_slot() {
        let mut swap = SwapStore::new(4);
        swap.write(0x0050_0000, &[1; PAGE_FRAME_SIZE]).unwrap();
        swap.write(0x0050_0800, &[2; PAGE_FRAME_SIZE]).unwrap();
        assert_eq!(swap.len(), 1);
        assert!(swap.slot(0x0050_0000).unwrap().iter().all(|b| *b == 2));
    }

    #[test]
    fn test_miss_leaves_destination_untouched() {
        let swap = SwapStore::new(4);
        let mut frame = [0xAB; PAGE_FRAME_SIZE];
        assert_eq!(
            swap.read_into(0x0060_0000, &mut frame),
            Err(VmError::SwapMiss {
                address: 0x0060_0000
            })
        );
        assert!(frame.iter().all(|b| *b == 0xAB));
    }

    #[test]
    fn test_exhaustion() {
        let mut swap = SwapStore::new(2);
        swap.seed(0x0050_0000, b"a").unwrap();
        swap.seed(0x0050_1000, b"b").unwrap();
        assert_eq!(
            swap.seed(0x0050_2000, b"c"),
            Err(VmError::SwapStoreExhausted { page: 0x0050_2000 })
        );
        assert!(!swap.exists(0x0050_2000));
        // Pages that already own a slot can still be rewritten.
        assert_eq!(swap.seed(0x0050_1000, b"d"), Ok(()));
        assert_eq!(swap.len(), swap.capacity());
    }

    #[test]
    fn test_seed_truncates_to_one_page() {
        let mut swap = SwapStore::new(1);
        let data = vec![7; PAGE_FRAME_SIZE + 10];
        swap.seed(0x0050_0000, &data).unwrap();
        assert!(swap.slot(0x0050_0000).unwrap().iter().all(|b| *b == 7));
    }
}
