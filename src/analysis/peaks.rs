use super::selection::Region;

// ---------------------------------------------------------------------------
// Peak detection
// ---------------------------------------------------------------------------

/// Optional peak conditions. Unset conditions do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakParams {
    /// Minimum signal value at the peak.
    pub height: Option<f64>,
    /// Minimum topographic prominence.
    pub prominence: Option<f64>,
    /// Minimum horizontal distance between peaks, in samples.
    pub distance: Option<usize>,
}

/// An absorption dip found in a selected region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Index into the region.
    pub index: usize,
    pub wavenumber: f64,
    pub flux: f64,
    /// Depth of the dip relative to its surroundings.
    pub prominence: f64,
}

/// Indices of local maxima of `x`. A flat plateau yields its midpoint
/// (rounded down); plateaus touching either end are not peaks.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Topographic prominence of each peak over the whole signal.
pub fn prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = x[peak];

            let mut left_min = height;
            for &v in x[..=peak].iter().rev() {
                if v > height {
                    break;
                }
                if v < left_min {
                    left_min = v;
                }
            }

            let mut right_min = height;
            for &v in &x[peak..] {
                if v > height {
                    break;
                }
                if v < right_min {
                    right_min = v;
                }
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Drop peaks closer than `distance` samples to a higher one.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    // Highest first; ties go to the rightmost peak.
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Peaks of `x` passing `params`, in ascending index order, paired with
/// their prominence.
///
/// Conditions apply in order: height, distance, prominence.
pub fn find_peaks(x: &[f64], params: &PeakParams) -> Vec<(usize, f64)> {
    let mut peaks = local_maxima(x);

    if let Some(height) = params.height {
        peaks.retain(|&p| x[p] >= height);
    }
    if let Some(distance) = params.distance.filter(|&d| d > 1) {
        peaks = select_by_distance(x, &peaks, distance);
    }

    let prom = prominences(x, &peaks);
    peaks
        .into_iter()
        .zip(prom)
        .filter(|&(_, p)| params.prominence.map_or(true, |min| p >= min))
        .collect()
}

/// Absorption dips of a region: peaks of the inverted flux.
///
/// `params.height` is given in flux units and keeps dips with
/// `flux <= height`.
pub fn find_dips(region: &Region, params: &PeakParams) -> Vec<Peak> {
    let inverted: Vec<f64> = region.flux.iter().map(|f| -f).collect();
    let inverted_params = PeakParams {
        height: params.height.map(|h| -h),
        ..*params
    };
    let peaks: Vec<Peak> = find_peaks(&inverted, &inverted_params)
        .into_iter()
        .map(|(index, prominence)| Peak {
            index,
            wavenumber: region.wavenumber[index],
            flux: region.flux[index],
            prominence,
        })
        .collect();
    log::debug!("found {} dips in {} samples", peaks.len(), region.len());
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plateau_midpoint() {
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 1.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 0.0]), vec![1]);
        // Plateaus running into the edge are not peaks.
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
        assert!(local_maxima(&[2.0, 1.0]).is_empty());
    }

    #[test]
    fn nan_samples_are_never_peaks() {
        assert_eq!(local_maxima(&[0.0, f64::NAN, 0.0, 2.0, 0.0]), vec![3]);
    }

    #[test]
    fn prominence_of_nested_peaks() {
        let x = [0.0, 5.0, 1.0, 3.0, 0.0];
        let prom = prominences(&x, &[1, 3]);
        assert_eq!(prom, vec![5.0, 2.0]);
    }

    #[test]
    fn distance_keeps_the_higher_peak() {
        let x = [0.0, 5.0, 0.0, 3.0, 0.0, 4.0, 0.0];
        let params = PeakParams {
            distance: Some(3),
            ..Default::default()
        };
        let found: Vec<usize> = find_peaks(&x, &params).into_iter().map(|(i, _)| i).collect();
        assert_eq!(found, vec![1, 5]);
    }

    #[test]
    fn height_and_prominence_filter() {
        let x = [0.0, 5.0, 1.0, 3.0, 0.0];
        let by_prom = PeakParams {
            prominence: Some(3.0),
            ..Default::default()
        };
        assert_eq!(find_peaks(&x, &by_prom), vec![(1, 5.0)]);
        let by_height = PeakParams {
            height: Some(4.0),
            ..Default::default()
        };
        assert_eq!(find_peaks(&x, &by_height), vec![(1, 5.0)]);
    }

    #[test]
    fn single_dip_is_found_at_its_minimum() {
        let wavenumber: Vec<f64> = (0..101).map(|i| 700.0 + i as f64 * 0.01).collect();
        let flux: Vec<f64> = wavenumber
            .iter()
            .map(|x| 1.0 - 0.6 * (-(x - 700.4f64).powi(2) / (2.0 * 0.03f64.powi(2))).exp())
            .collect();
        let region = Region { wavenumber, flux };
        let params = PeakParams {
            height: Some(0.9),
            prominence: Some(0.1),
            distance: None,
        };
        let dips = find_dips(&region, &params);
        assert_eq!(dips.len(), 1);
        assert_eq!(dips[0].index, 40);
        assert_relative_eq!(dips[0].wavenumber, 700.4, epsilon = 1e-9);
        assert_relative_eq!(dips[0].flux, 0.4, epsilon = 1e-9);
        assert!(dips[0].prominence > 0.5);
    }

    #[test]
    fn height_threshold_is_in_flux_units() {
        let region = Region {
            wavenumber: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
            flux: vec![1.0, 0.95, 1.0, 0.5, 1.0, 0.92, 1.0],
        };
        let params = PeakParams {
            height: Some(0.9),
            ..Default::default()
        };
        let dips = find_dips(&region, &params);
        assert_eq!(dips.iter().map(|p| p.index).collect::<Vec<_>>(), vec![3]);
    }
}
