use super::*;

struct JoinState<T> {
    values: Vec<Option<T>>,
    errors: Vec<VendError>,
    remaining: usize,
    completer: Option<Completer<Vec<T>>>,
}

impl<T> JoinState<T> {
    fn finish(&mut self) -> Option<(Completer<Vec<T>>, VendResult<Vec<T>>)> {
        let completer = self.completer.take()?;
        if self.errors.is_empty() {
            let values = std::mem::take(&mut self.values);
            Some((completer, Ok(values.into_iter().flatten().collect())))
        } else {
            let mut errors = std::mem::take(&mut self.errors).into_iter();
            let primary = errors.next()?;
            Some((completer, Err(VendError::aggregate(primary, errors.collect()))))
        }
    }
}

/// Complete with all values in input order once every input succeeded.
///
/// If any input fails, the result fails with the first failure observed
/// and every later failure attached as suppressed. The result waits for all
/// inputs to reach their terminal state so that no failure is lost.
pub fn join<T: ResultValue>(results: Vec<AsyncResult<T>>) -> AsyncResult<Vec<T>> {
    let (completer, out) = AsyncResult::create();

    if results.is_empty() {
        completer.set(Vec::new());
        return out;
    }

    let state = Arc::new(Mutex::new(JoinState {
        values: (0..results.len()).map(|_| None).collect(),
        errors: Vec::new(),
        remaining: results.len(),
        completer: Some(completer),
    }));

    for (index, result) in results.into_iter().enumerate() {
        let state = state.clone();
        result.on_complete(move |r| {
            let finished = {
                let mut lock = state.lock().unwrap();
                match r {
                    Ok(v) => lock.values[index] = Some(v.clone()),
                    Err(e) => lock.errors.push(e.clone()),
                }
                lock.remaining -= 1;
                if lock.remaining == 0 {
                    lock.finish()
                } else {
                    None
                }
            };
            if let Some((completer, result)) = finished {
                completer.complete(result);
            }
        });
    }

    out
}
