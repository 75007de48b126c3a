//! Domain decomposition: every worker builds the wavelet tree of its own
//! text slice sequentially; the merge step rebalances afterwards.

use crate::histogram::Histogram;
use crate::sym::Symbol;
use crate::wt::nodebased::WaveletTreeNodebased;
use crate::wt::sequential::wt_nodebased_sequential;
use crate::wt::Shape;

/// Builds the node-keyed tree of the local text slice. The slice is
/// clobbered in the process.
pub fn build_nodebased<S: Symbol>(
    hist: &Histogram<S>,
    etext: &mut [S],
) -> WaveletTreeNodebased {
    let shape = Shape::new(hist.size());
    let nodes = wt_nodebased_sequential(&shape, etext);
    WaveletTreeNodebased::new(hist, nodes)
}
